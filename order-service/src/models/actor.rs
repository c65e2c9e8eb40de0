use serde::{Deserialize, Serialize};

/// The three kinds of marketplace participant that act on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Retailer,
    Wholesaler,
    Transporter,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Retailer => "retailer",
            ActorRole::Wholesaler => "wholesaler",
            ActorRole::Transporter => "transporter",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retailer" => Some(ActorRole::Retailer),
            "wholesaler" => Some(ActorRole::Wholesaler),
            "transporter" => Some(ActorRole::Transporter),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who is performing an operation. Always passed explicitly; the order engine
/// never reads identity from ambient state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    pub role: ActorRole,
    pub id: String,
}

impl ActorContext {
    pub fn new(role: ActorRole, id: impl Into<String>) -> Self {
        Self {
            role,
            id: id.into(),
        }
    }

    pub fn retailer(id: impl Into<String>) -> Self {
        Self::new(ActorRole::Retailer, id)
    }

    pub fn wholesaler(id: impl Into<String>) -> Self {
        Self::new(ActorRole::Wholesaler, id)
    }

    pub fn transporter(id: impl Into<String>) -> Self {
        Self::new(ActorRole::Transporter, id)
    }
}
