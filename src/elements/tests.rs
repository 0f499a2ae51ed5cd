use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use futures::executor::block_on;

use crate::validators::{AsyncValidator, Message, Validator, Validity, ValiditySource};
use crate::value::{FieldKey, FieldValue};

use super::*;

fn counted<T>(count: Arc<AtomicUsize>) -> impl Fn(&T) + Send + Sync + 'static {
    move |_state| {
        count.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn every_field_mutator_emits_exactly_once() {
    let field = Field::from_template(
        &FieldTemplate::new("name", FieldValue::text("")).excludable(),
    );
    let emissions = Arc::new(AtomicUsize::new(0));
    let _subscription = field
        .subscribe_to_state(counted(emissions.clone()))
        .expect("subscribe");

    field.set_value(FieldValue::text("a")).expect("set value");
    assert_eq!(emissions.load(Ordering::SeqCst), 1);
    field.focus().expect("focus");
    assert_eq!(emissions.load(Ordering::SeqCst), 2);
    field.visit().expect("visit");
    assert_eq!(emissions.load(Ordering::SeqCst), 3);
    field.set_submitted().expect("set submitted");
    assert_eq!(emissions.load(Ordering::SeqCst), 4);
    field.set_exclude(true).expect("set exclude");
    assert_eq!(emissions.load(Ordering::SeqCst), 5);
    field.reset().expect("reset");
    assert_eq!(emissions.load(Ordering::SeqCst), 6);
}

#[test]
fn interaction_flags_are_monotonic_until_reset() {
    let field = Field::from_template(&FieldTemplate::new("name", FieldValue::text("")));

    field.focus().expect("focus");
    field.visit().expect("visit");
    field.set_value(FieldValue::text("typed")).expect("set value");
    let state = field.state().expect("state");
    assert!(state.focused && state.visited && state.modified);

    field.focus().expect("second focus");
    field.set_value(FieldValue::text("more")).expect("second set");
    let state = field.state().expect("state");
    assert!(state.focused && state.visited && state.modified);

    field.reset().expect("reset");
    let state = field.state().expect("state");
    assert!(!state.focused && !state.visited && !state.modified && !state.submitted);
}

#[test]
fn visit_without_a_prior_focus_does_not_mark_visited() {
    let field = Field::from_template(&FieldTemplate::new("name", FieldValue::text("")));
    field.visit().expect("visit");
    assert!(!field.state().expect("state").visited);
    field.focus().expect("focus");
    field.visit().expect("visit after focus");
    assert!(field.state().expect("state").visited);
}

#[test]
fn set_value_revalidates_but_never_trims_the_stored_value() {
    let field = Field::from_template(
        &FieldTemplate::new("name", FieldValue::text(""))
            .validator(Validator::min_length(2, "Too short.")),
    );
    assert_eq!(field.state().expect("state").validity, Validity::Invalid);

    field.set_value(FieldValue::text("  ab  ")).expect("set value");
    let state = field.state().expect("state");
    assert_eq!(state.validity, Validity::Valid);
    assert_eq!(state.value, FieldValue::text("  ab  "));
}

#[test]
fn reset_restores_the_construction_snapshot() {
    let field = Field::from_template(
        &FieldTemplate::new("name", FieldValue::text("default"))
            .validator(Validator::required("Required.").valid_message("Thanks."))
            .excludable(),
    );
    let initial = field.state().expect("initial state");

    field.focus().expect("focus");
    field.visit().expect("visit");
    field.set_value(FieldValue::text("")).expect("set value");
    field.set_submitted().expect("set submitted");
    field.set_exclude(true).expect("set exclude");
    assert_ne!(field.state().expect("mutated state"), initial);

    field.reset().expect("reset");
    assert_eq!(field.state().expect("state after reset"), initial);
}

#[test]
fn set_exclude_requires_an_excludable_field() {
    let field = Field::from_template(&FieldTemplate::new("plain", FieldValue::text("")));
    assert_eq!(
        field.set_exclude(true),
        Err(crate::error::FormError::NotExcludable(FieldKey::new("plain")))
    );
}

fn password_group() -> (Field, Field, Group) {
    let password = Field::from_template(
        &FieldTemplate::new("password", FieldValue::text(""))
            .validator(Validator::required("Password is required.")),
    );
    let confirm_password =
        Field::from_template(&FieldTemplate::new("confirmPassword", FieldValue::text("x")));
    let template = GroupTemplate::new("passwords", ["password", "confirmPassword"]).validator(
        Validator::predicate(|value| {
            let Some(entries) = value.as_map() else {
                return false;
            };
            entries.get(&FieldKey::new("password"))
                == entries.get(&FieldKey::new("confirmPassword"))
        })
        .valid_message("The passwords match.")
        .invalid_message("The passwords do not match."),
    );
    let members: Vec<SharedSource> = vec![
        Arc::new(password.clone()),
        Arc::new(confirm_password.clone()),
    ];
    let group = Group::connect(&template, members).expect("connect group");
    (password, confirm_password, group)
}

#[test]
fn group_reduces_before_running_its_own_validators() {
    let (password, confirm_password, group) = password_group();

    // password is Invalid, so the cross-field predicate must not run.
    let state = group.state().expect("group state");
    assert_eq!(state.validity, Validity::Invalid);
    assert_eq!(state.validity_source, ValiditySource::Reduction);
    assert!(state.messages.is_empty());

    password.set_value(FieldValue::text("secret")).expect("set password");
    confirm_password
        .set_value(FieldValue::text("secret"))
        .expect("set confirmation");
    let state = group.state().expect("group state");
    assert_eq!(state.validity, Validity::Valid);
    assert_eq!(state.validity_source, ValiditySource::Validation);
    assert_eq!(
        state.messages,
        vec![Message::new("The passwords match.", Validity::Valid)]
    );

    confirm_password
        .set_value(FieldValue::text("wrong"))
        .expect("set mismatched confirmation");
    let state = group.state().expect("group state");
    assert_eq!(state.validity, Validity::Invalid);
    assert_eq!(state.validity_source, ValiditySource::Validation);
    assert_eq!(
        state.messages,
        vec![Message::new("The passwords do not match.", Validity::Invalid)]
    );
}

#[test]
fn group_composite_value_maps_member_names_to_values() {
    let (password, _confirm_password, group) = password_group();
    password.set_value(FieldValue::text("secret")).expect("set password");

    let state = group.state().expect("group state");
    assert_eq!(
        state.value.get(&FieldKey::new("password")),
        Some(&FieldValue::text("secret"))
    );
    assert_eq!(
        state.value.get(&FieldKey::new("confirmPassword")),
        Some(&FieldValue::text("x"))
    );
}

#[test]
fn an_excluded_member_is_dropped_from_group_value_and_validity() {
    let optional = Field::from_template(
        &FieldTemplate::new("optional", FieldValue::text(""))
            .validator(Validator::required("Required."))
            .excluded_by_default(),
    );
    let stable = Field::from_template(&FieldTemplate::new("stable", FieldValue::text("ok")));
    let members: Vec<SharedSource> =
        vec![Arc::new(optional.clone()), Arc::new(stable.clone())];
    let group = Group::connect(&GroupTemplate::new("pair", ["optional", "stable"]), members)
        .expect("connect group");

    let state = group.state().expect("group state");
    assert_eq!(state.validity, Validity::Valid);
    assert!(!state.value.contains_key(&FieldKey::new("optional")));

    optional.set_exclude(false).expect("include member");
    let state = group.state().expect("group state");
    assert_eq!(state.validity, Validity::Invalid);
    assert!(state.value.contains_key(&FieldKey::new("optional")));
}

#[test]
fn adapter_mirrors_source_validity_and_emits_once_per_source_emission() {
    let field = Field::from_template(
        &FieldTemplate::new("city", FieldValue::text(""))
            .validator(Validator::required("Required.")),
    );
    let template = AdapterTemplate::new("cityUpper", "city", |snapshot| {
        FieldValue::text(
            snapshot
                .value
                .as_text()
                .unwrap_or_default()
                .to_uppercase(),
        )
    });
    let adapter =
        Adapter::connect(&template, Arc::new(field.clone())).expect("connect adapter");
    let emissions = Arc::new(AtomicUsize::new(0));
    let _subscription = adapter
        .subscribe_to_state(counted(emissions.clone()))
        .expect("subscribe");

    assert_eq!(adapter.state().expect("state").validity, Validity::Invalid);

    field.set_value(FieldValue::text("lyon")).expect("set value");
    let state = adapter.state().expect("state");
    assert_eq!(state.value, FieldValue::text("LYON"));
    assert_eq!(state.validity, Validity::Valid);
    assert_eq!(emissions.load(Ordering::SeqCst), 1);

    field.focus().expect("focus");
    assert_eq!(emissions.load(Ordering::SeqCst), 2);
}

#[test]
fn excludable_adapter_decides_its_own_exclusion() {
    let field = Field::from_template(&FieldTemplate::new("nickname", FieldValue::text("")));
    let template = AdapterTemplate::excludable("nickname", "nickname", |snapshot| {
        let blank = snapshot.value.is_blank();
        (snapshot.value.clone(), blank)
    });
    let adapter =
        Adapter::connect(&template, Arc::new(field.clone())).expect("connect adapter");

    assert!(adapter.state().expect("state").exclude);
    field.set_value(FieldValue::text("Lili")).expect("set value");
    let state = adapter.state().expect("state");
    assert!(!state.exclude);
    assert_eq!(state.value, FieldValue::text("Lili"));
}

#[test]
fn default_adapter_applies_the_trim_policy_downstream_only() {
    let field = Field::from_template(&FieldTemplate::new("city", FieldValue::text("")));
    let adapter = Adapter::connect(
        &AdapterTemplate::default_for(FieldKey::new("city"), true),
        Arc::new(field.clone()),
    )
    .expect("connect adapter");

    field.set_value(FieldValue::text("  Lyon  ")).expect("set value");
    assert_eq!(adapter.state().expect("state").value, FieldValue::text("Lyon"));
    assert_eq!(field.state().expect("state").value, FieldValue::text("  Lyon  "));
}

#[test]
fn auto_trim_policy_lists_allow_and_deny_by_name() {
    assert!(AutoTrim::All.applies_to(FieldKey::new("any")));
    assert!(!AutoTrim::None.applies_to(FieldKey::new("any")));
    let include = AutoTrim::include(["city"]);
    assert!(include.applies_to(FieldKey::new("city")));
    assert!(!include.applies_to(FieldKey::new("name")));
    let exclude = AutoTrim::exclude(["raw"]);
    assert!(!exclude.applies_to(FieldKey::new("raw")));
    assert!(exclude.applies_to(FieldKey::new("city")));
}

#[test]
fn derived_value_recomputes_on_every_source_emission() {
    let first = Field::from_template(&FieldTemplate::new("first", FieldValue::text("Lili")));
    let last =
        Field::from_template(&FieldTemplate::new("last", FieldValue::text("Boulanger")));
    let template = DerivedValueTemplate::new("greeting", ["first", "last"], |snapshots| {
        let names: Vec<&str> = snapshots
            .iter()
            .filter_map(|snapshot| snapshot.value.as_text())
            .collect();
        FieldValue::text(format!("Hello, {}!", names.join(" ")))
    });
    let sources: Vec<SharedSource> = vec![Arc::new(first.clone()), Arc::new(last.clone())];
    let derived = DerivedValue::connect(&template, sources).expect("connect derived value");

    assert_eq!(
        derived.value().expect("value"),
        FieldValue::text("Hello, Lili Boulanger!")
    );

    let emissions = Arc::new(AtomicUsize::new(0));
    let _subscription = derived
        .subscribe_to_state(counted(emissions.clone()))
        .expect("subscribe");
    first.set_value(FieldValue::text("Nadia")).expect("set value");
    assert_eq!(emissions.load(Ordering::SeqCst), 1);
    assert_eq!(
        derived.value().expect("value"),
        FieldValue::text("Hello, Nadia Boulanger!")
    );
}

#[test]
fn stale_async_resolution_is_discarded_by_the_ticket() {
    let field = Field::from_template(
        &FieldTemplate::new("email", FieldValue::text("")).async_validator(
            AsyncValidator::new(|value: FieldValue| {
                Box::pin(async move {
                    if value.as_text().is_some_and(|text| text.contains("bad")) {
                        Validity::Invalid
                    } else {
                        Validity::Valid
                    }
                })
            })
            .invalid_message("Address rejected.")
            .debounce_ms(30),
        ),
    );

    field.set_value(FieldValue::text("bad@calm.ui")).expect("first set");
    assert_eq!(field.state().expect("state").validity, Validity::Pending);

    let slow = {
        let field = field.clone();
        thread::spawn(move || {
            block_on(field.resolve_async_validation()).expect("slow resolve");
        })
    };
    thread::sleep(Duration::from_millis(10));
    field.set_value(FieldValue::text("good@calm.ui")).expect("second set");
    let fast = {
        let field = field.clone();
        thread::spawn(move || {
            block_on(field.resolve_async_validation()).expect("fast resolve");
        })
    };
    slow.join().expect("slow thread joins");
    fast.join().expect("fast thread joins");

    let state = field.state().expect("state");
    assert_eq!(state.value, FieldValue::text("good@calm.ui"));
    assert_eq!(state.validity, Validity::Valid);
    assert!(state.messages.is_empty());
}

#[test]
fn async_validators_hold_the_field_pending_with_interim_messages() {
    let field = Field::from_template(
        &FieldTemplate::new("handle", FieldValue::text("taken")).async_validator(
            AsyncValidator::new(|value: FieldValue| {
                Box::pin(async move {
                    if value.as_text() == Some("taken") {
                        Validity::Invalid
                    } else {
                        Validity::Valid
                    }
                })
            })
            .pending_message("Checking availability...")
            .invalid_message("Handle is taken."),
        ),
    );

    let state = field.state().expect("state");
    assert_eq!(state.validity, Validity::Pending);
    assert_eq!(
        state.messages,
        vec![Message::new("Checking availability...", Validity::Pending)]
    );

    block_on(field.resolve_async_validation()).expect("resolve");
    let state = field.state().expect("state");
    assert_eq!(state.validity, Validity::Invalid);
    assert_eq!(
        state.messages,
        vec![Message::new("Handle is taken.", Validity::Invalid)]
    );
}
