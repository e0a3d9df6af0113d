use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Step(Step),
    Decision(Decision),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub condition: String,
    pub on_true: Branch,
    pub on_false: Branch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// One outcome of a decision: a leaf task, not a nested flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl Step {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: None,
        }
    }

    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

impl Decision {
    pub fn new(
        condition: impl Into<String>,
        on_true: impl Into<String>,
        on_false: impl Into<String>,
    ) -> Self {
        Self {
            condition: condition.into(),
            on_true: Branch::new(on_true),
            on_false: Branch::new(on_false),
            owner: None,
        }
    }

    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

impl Branch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: None,
        }
    }
}

impl Record {
    /// Display text of the record: the step name or the decision condition.
    pub fn label(&self) -> &str {
        match self {
            Record::Step(s) => &s.name,
            Record::Decision(d) => &d.condition,
        }
    }

    pub fn owner(&self) -> Option<&str> {
        match self {
            Record::Step(s) => s.owner.as_deref(),
            Record::Decision(d) => d.owner.as_deref(),
        }
    }

    /// First text field left blank, if any. Hand-edited record lists can
    /// carry these; the extractor never produces them.
    pub fn missing_field(&self) -> Option<&'static str> {
        let blank = |s: &str| s.trim().is_empty();
        match self {
            Record::Step(s) if blank(&s.name) => Some("name"),
            Record::Step(_) => None,
            Record::Decision(d) if blank(&d.condition) => Some("condition"),
            Record::Decision(d) if blank(&d.on_true.name) => Some("on_true"),
            Record::Decision(d) if blank(&d.on_false.name) => Some("on_false"),
            Record::Decision(_) => None,
        }
    }
}

impl From<Step> for Record {
    fn from(step: Step) -> Self {
        Record::Step(step)
    }
}

impl From<Decision> for Record {
    fn from(decision: Decision) -> Self {
        Record::Decision(decision)
    }
}
