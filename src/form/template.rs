use crate::elements::{AdapterTemplate, AutoTrim, DerivedValueTemplate, FieldTemplate, GroupTemplate};
use crate::error::FormResult;
use crate::value::FieldKey;

use super::Form;

#[derive(Clone)]
pub enum FormElementTemplate {
    Field(FieldTemplate),
    SubForm(FormTemplate),
}

impl FormElementTemplate {
    pub(crate) fn key(&self) -> FieldKey {
        match self {
            FormElementTemplate::Field(template) => template.key(),
            FormElementTemplate::SubForm(template) => template.name,
        }
    }
}

impl From<FieldTemplate> for FormElementTemplate {
    fn from(template: FieldTemplate) -> Self {
        FormElementTemplate::Field(template)
    }
}

impl From<FormTemplate> for FormElementTemplate {
    fn from(template: FormTemplate) -> Self {
        FormElementTemplate::SubForm(template)
    }
}

/// Declares a whole form: its elements, groups, adapters, derived
/// values, the auto-trim policy, and the form-level default messages.
/// `build` is the factory; a template that declares duplicate names or
/// dangling references is not instantiable.
#[derive(Clone)]
pub struct FormTemplate {
    pub(crate) name: FieldKey,
    pub(crate) template_id: Option<&'static str>,
    pub(crate) elements: Vec<FormElementTemplate>,
    pub(crate) groups: Vec<GroupTemplate>,
    pub(crate) adapters: Vec<AdapterTemplate>,
    pub(crate) derived_values: Vec<DerivedValueTemplate>,
    pub(crate) auto_trim: AutoTrim,
    pub(crate) valid_message: Option<String>,
    pub(crate) invalid_message: Option<String>,
    pub(crate) pending_message: Option<String>,
}

impl FormTemplate {
    pub fn new(name: &'static str) -> Self {
        Self {
            name: FieldKey::new(name),
            template_id: None,
            elements: Vec::new(),
            groups: Vec::new(),
            adapters: Vec::new(),
            derived_values: Vec::new(),
            auto_trim: AutoTrim::None,
            valid_message: None,
            invalid_message: None,
            pending_message: None,
        }
    }

    pub fn name(&self) -> FieldKey {
        self.name
    }

    pub fn id(mut self, id: &'static str) -> Self {
        self.template_id = Some(id);
        self
    }

    pub fn field(mut self, template: FieldTemplate) -> Self {
        self.elements.push(FormElementTemplate::Field(template));
        self
    }

    pub fn subform(mut self, template: FormTemplate) -> Self {
        self.elements.push(FormElementTemplate::SubForm(template));
        self
    }

    pub fn group(mut self, template: GroupTemplate) -> Self {
        self.groups.push(template);
        self
    }

    pub fn adapter(mut self, template: AdapterTemplate) -> Self {
        self.adapters.push(template);
        self
    }

    pub fn derived_value(mut self, template: DerivedValueTemplate) -> Self {
        self.derived_values.push(template);
        self
    }

    pub fn auto_trim(mut self, policy: AutoTrim) -> Self {
        self.auto_trim = policy;
        self
    }

    pub fn valid_message(mut self, message: impl Into<String>) -> Self {
        self.valid_message = Some(message.into());
        self
    }

    pub fn invalid_message(mut self, message: impl Into<String>) -> Self {
        self.invalid_message = Some(message.into());
        self
    }

    pub fn pending_message(mut self, message: impl Into<String>) -> Self {
        self.pending_message = Some(message.into());
        self
    }

    pub fn build(self) -> FormResult<Form> {
        Form::from_template(self)
    }
}
