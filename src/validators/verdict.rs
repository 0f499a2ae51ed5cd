#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Validity {
    Valid,
    Invalid,
    Pending,
}

impl Validity {
    /// Invalid wins over Pending, Pending wins over Valid.
    pub fn merge(self, other: Validity) -> Validity {
        match (self, other) {
            (Validity::Invalid, _) | (_, Validity::Invalid) => Validity::Invalid,
            (Validity::Pending, _) | (_, Validity::Pending) => Validity::Pending,
            (Validity::Valid, Validity::Valid) => Validity::Valid,
        }
    }

    pub fn reduce(validities: impl IntoIterator<Item = Validity>) -> Validity {
        validities
            .into_iter()
            .fold(Validity::Valid, Validity::merge)
    }

    pub fn is_valid(self) -> bool {
        self == Validity::Valid
    }
}

/// Whether an entity's current validity came from reducing its members
/// or from running its own validators over already-valid members.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ValiditySource {
    Reduction,
    Validation,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Message {
    pub text: String,
    pub validity: Validity,
}

impl Message {
    pub fn new(text: impl Into<String>, validity: Validity) -> Self {
        Self {
            text: text.into(),
            validity,
        }
    }
}
