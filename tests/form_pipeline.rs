use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use calmform::{
    AdapterTemplate, AutoTrim, FieldKey, FieldTemplate, FieldValue, FormTemplate, GroupTemplate,
    Message, Validator, Validity, ValiditySource,
};

fn sign_up_form() -> FormTemplate {
    FormTemplate::new("signUp")
        .id("sign-up")
        .field(
            FieldTemplate::new("email", FieldValue::text(""))
                .validator(Validator::required("Email is required.")),
        )
        .field(
            FieldTemplate::new("password", FieldValue::text(""))
                .validator(Validator::min_length(8, "Password must be at least 8 characters."))
                .validator(Validator::required("Password is required.")),
        )
        .field(
            FieldTemplate::new("confirmPassword", FieldValue::text(""))
                .validator(Validator::required("Please confirm your password."))
                .transient(),
        )
        .group(
            GroupTemplate::new("passwords", ["password", "confirmPassword"]).validator(
                Validator::predicate(|value| {
                    let Some(entries) = value.as_map() else {
                        return false;
                    };
                    entries.get(&FieldKey::new("password"))
                        == entries.get(&FieldKey::new("confirmPassword"))
                })
                .valid_message("The passwords match.")
                .invalid_message("The passwords do not match."),
            ),
        )
        .auto_trim(AutoTrim::include(["email"]))
        .invalid_message("Please fix the highlighted fields.")
}

#[test]
fn a_complete_sign_up_flow_confirms_with_the_reduced_value() {
    let form = sign_up_form().build().expect("build form");
    assert_eq!(form.state().expect("state").validity, Validity::Invalid);

    let email = form.field("email").expect("email field");
    let password = form.field("password").expect("password field");
    let confirm_password = form.field("confirmPassword").expect("confirmPassword field");

    email.focus().expect("focus");
    email.set_value(FieldValue::text("  lili@calm.ui  ")).expect("set email");
    email.visit().expect("visit");
    password.set_value(FieldValue::text("une barque")).expect("set password");
    confirm_password
        .set_value(FieldValue::text("une barque"))
        .expect("set confirmation");

    let group = form.group("passwords").expect("passwords group");
    let group_state = group.state().expect("group state");
    assert_eq!(group_state.validity, Validity::Valid);
    assert_eq!(group_state.validity_source, ValiditySource::Validation);
    assert_eq!(
        group_state.messages,
        vec![Message::new("The passwords match.", Validity::Valid)]
    );

    let confirmed = Arc::new(Mutex::new(None::<BTreeMap<FieldKey, FieldValue>>));
    {
        let confirmed = confirmed.clone();
        form.confirm(
            move |value| {
                *confirmed.lock().expect("confirmed lock") = Some(value.clone());
            },
            |_state| panic!("a fully valid form must confirm"),
        )
        .expect("confirm");
    }

    let value = confirmed
        .lock()
        .expect("confirmed lock")
        .clone()
        .expect("confirmed value");
    // Transient confirmPassword never reaches the value; email arrives
    // trimmed by its default adapter.
    let mut expected = BTreeMap::new();
    expected.insert(FieldKey::new("email"), FieldValue::text("lili@calm.ui"));
    expected.insert(FieldKey::new("password"), FieldValue::text("une barque"));
    assert_eq!(value, expected);
}

#[test]
fn mismatched_passwords_block_confirmation_with_group_messages() {
    let form = sign_up_form().build().expect("build form");
    form.field("email")
        .expect("email field")
        .set_value(FieldValue::text("lili@calm.ui"))
        .expect("set email");
    form.field("password")
        .expect("password field")
        .set_value(FieldValue::text("une barque"))
        .expect("set password");
    form.field("confirmPassword")
        .expect("confirmPassword field")
        .set_value(FieldValue::text("un bateau"))
        .expect("set confirmation");

    let group_state = form
        .group("passwords")
        .expect("passwords group")
        .state()
        .expect("group state");
    assert_eq!(group_state.validity, Validity::Invalid);
    assert_eq!(group_state.validity_source, ValiditySource::Validation);
    assert_eq!(
        group_state.messages,
        vec![Message::new("The passwords do not match.", Validity::Invalid)]
    );

    let failures = Arc::new(AtomicUsize::new(0));
    {
        let failures = failures.clone();
        form.confirm(
            |_value| panic!("a mismatched form must not confirm"),
            move |state| {
                assert_eq!(state.validity, Validity::Invalid);
                assert_eq!(
                    state.messages,
                    vec![Message::new(
                        "Please fix the highlighted fields.",
                        Validity::Invalid
                    )]
                );
                failures.fetch_add(1, Ordering::SeqCst);
            },
        )
        .expect("confirm");
    }
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}

#[test]
fn every_field_emission_reaches_form_subscribers_unbatched() {
    let form = sign_up_form().build().expect("build form");
    let emissions = Arc::new(AtomicUsize::new(0));
    let emissions_in_callback = emissions.clone();
    let _subscription = form
        .subscribe_to_state(move |_state| {
            emissions_in_callback.fetch_add(1, Ordering::SeqCst);
        })
        .expect("subscribe");

    // email is not a group member: its one emission reaches the form
    // exactly once, through its adapter.
    form.field("email")
        .expect("email field")
        .set_value(FieldValue::text("lili@calm.ui"))
        .expect("set email");
    assert_eq!(emissions.load(Ordering::SeqCst), 1);

    // password is also a group member: the group and the adapter each
    // push one reduction downstream, nothing coalesces.
    form.field("password")
        .expect("password field")
        .set_value(FieldValue::text("une barque"))
        .expect("set password");
    assert_eq!(emissions.load(Ordering::SeqCst), 3);
}

#[test]
fn reset_after_arbitrary_mutations_restores_the_construction_state() {
    let form = sign_up_form().build().expect("build form");
    let initial = form.state().expect("initial state");

    let email = form.field("email").expect("email field");
    email.focus().expect("focus");
    email.set_value(FieldValue::text("x@y.z")).expect("set email");
    email.visit().expect("visit");
    form.field("password")
        .expect("password field")
        .set_value(FieldValue::text("une barque"))
        .expect("set password");
    form.confirm(|_value| {}, |_state| {}).expect("confirm");

    form.reset().expect("reset");
    let after_reset = form.state().expect("state after reset");
    assert_eq!(after_reset, initial);
    assert!(!after_reset.confirmation_attempted);

    let email_state = email.state().expect("email state");
    assert!(!email_state.focused && !email_state.visited && !email_state.modified);
    assert_eq!(email_state.value, FieldValue::text(""));
}

#[test]
fn a_custom_adapter_renames_a_group_into_the_form_value() {
    let form = FormTemplate::new("signature")
        .field(FieldTemplate::new("firstName", FieldValue::text("Lili")).transient())
        .field(FieldTemplate::new("lastName", FieldValue::text("Boulanger")).transient())
        .field(FieldTemplate::new("occupation", FieldValue::text("composer")))
        .group(GroupTemplate::new("fullName", ["firstName", "lastName"]))
        .adapter(AdapterTemplate::new("fullName", "fullName", |snapshot| {
            let entries = snapshot.value.as_map().cloned().unwrap_or_default();
            let first = entries
                .get(&FieldKey::new("firstName"))
                .and_then(|value| value.as_text().map(str::to_string))
                .unwrap_or_default();
            let last = entries
                .get(&FieldKey::new("lastName"))
                .and_then(|value| value.as_text().map(str::to_string))
                .unwrap_or_default();
            FieldValue::text(format!("{last}, {first}"))
        }))
        .build()
        .expect("build form");

    let mut expected = BTreeMap::new();
    expected.insert(FieldKey::new("fullName"), FieldValue::text("Boulanger, Lili"));
    expected.insert(FieldKey::new("occupation"), FieldValue::text("composer"));
    assert_eq!(form.state().expect("state").value, expected);
}
