use fleetvest_core::Money;
use rust_decimal::Decimal;
use serde::Deserialize;

/// Event type the provider sends when a charge has settled.
pub const CHARGE_SUCCESS: &str = "charge.success";

/// Envelope for an inbound provider notification.
#[derive(Clone, Debug, Deserialize)]
pub struct ProviderEvent {
    pub event: String,
    pub data: Option<ChargeData>,
}

/// Charge payload. The amount arrives in minor currency units.
#[derive(Clone, Debug, Deserialize)]
pub struct ChargeData {
    pub amount: i64,
    pub reference: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl ChargeData {
    /// Amount converted to major units (the provider sends pesewas).
    pub fn amount_major(&self) -> Money {
        Decimal::new(self.amount, 2)
    }

    /// Target account id carried in the metadata, when present.
    pub fn account_id(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|meta| meta.get("user_id"))
            .and_then(|value| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_a_charge_event() {
        let body = r#"{
            "event": "charge.success",
            "data": {
                "amount": 25000,
                "reference": "ps_ref_9",
                "metadata": { "user_id": "acct-1" }
            }
        }"#;
        let event: ProviderEvent = serde_json::from_str(body).unwrap();
        assert_eq!(event.event, CHARGE_SUCCESS);
        let data = event.data.unwrap();
        assert_eq!(data.amount_major(), dec!(250));
        assert_eq!(data.account_id(), Some("acct-1"));
    }

    #[test]
    fn tolerates_missing_metadata() {
        let body = r#"{"event":"charge.success","data":{"amount":100,"reference":"r"}}"#;
        let event: ProviderEvent = serde_json::from_str(body).unwrap();
        assert_eq!(event.data.unwrap().account_id(), None);
    }
}
