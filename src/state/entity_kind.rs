use std::fmt;

/// The kinds of entity the job ledger tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Category,
    Product,
}

impl EntityKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Product => "product",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "category" => Some(Self::Category),
            "product" => Some(Self::Product),
            _ => None,
        }
    }

    pub fn all() -> [Self; 2] {
        [Self::Category, Self::Product]
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
