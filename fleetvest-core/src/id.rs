use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Mint a fresh random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(
    /// Identifier of an account record. Opaque so that ids issued by an
    /// external identity provider can be carried verbatim.
    AccountId
);
identifier!(
    /// Identifier of a vehicle listed for fractional investment.
    VehicleId
);
identifier!(
    /// Identifier of an investment position.
    InvestmentId
);
identifier!(
    /// Identifier of an append-only transaction record.
    TransactionId
);
identifier!(
    /// Identifier of a referrer/referred relationship record.
    ReferralId
);
identifier!(
    /// Identifier of a withdrawal request.
    WithdrawalId
);
