//! Sage Business Cloud Accounting other payments/receipts
//!
//! Records are flat: one net amount, one tax amount and one ledger account.
//! Create requests wrap the record in `other_payment`; lists come back as
//! `$items` with a `$next` link while more pages remain.

use finsync_core::FormatAdapter;
use finsync_domain::{
    DateRange, DecodedBatch, Direction, ListRequest, Money, ProviderId, ProviderResponse,
    ProviderTransaction, Transaction,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    amount_as_decimal, decode_items, format_wire_date, optional_amount_as_decimal,
    optional_wire_amount, parse_wire_date, wire_amount, AccountMapping, ChartOfAccounts,
    VatTreatment, PAGE_SIZE,
};

const WRAPPER: &str = "other_payment";

#[derive(Debug, Clone)]
pub struct SageAdapter {
    accounts: AccountMapping,
}

impl Default for SageAdapter {
    fn default() -> Self {
        Self::with_accounts(default_accounts())
    }
}

impl SageAdapter {
    pub fn with_accounts(accounts: AccountMapping) -> Self {
        Self { accounts }
    }

    fn decode(&self, value: &Value) -> Option<Transaction> {
        let record: OtherPayment = serde_json::from_value(value.clone()).ok()?;
        let direction = match record.transaction_type_id.as_str() {
            "OTHER_RECEIPT" => Direction::Income,
            "OTHER_PAYMENT" => Direction::Expense,
            _ => return None,
        };
        let net = match record.net_amount {
            Some(net) => net,
            None => record.total_amount.checked_sub(record.tax_amount.unwrap_or_default())?,
        };
        let reference = record.reference.filter(|r| !r.trim().is_empty());
        let id = record.id.or_else(|| reference.clone())?;

        Some(Transaction {
            reference: reference.unwrap_or_else(|| id.clone()),
            id,
            date: parse_wire_date(&record.date)?,
            description: record.description.unwrap_or_default(),
            amount: net,
            direction,
            category: self.accounts.category_name(direction, &record.ledger_account_id),
            account: self.accounts.bank.name_for(&record.bank_account_id),
            vat_amount: record.tax_amount,
            vat_rate: record.tax_rate_id.as_deref().map_or(VatTreatment::Standard, tax_treatment).rate(),
        })
    }
}

impl FormatAdapter for SageAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::Sage
    }

    fn to_wire(&self, transaction: &Transaction) -> ProviderTransaction {
        let record = OtherPayment {
            id: None,
            transaction_type_id: match transaction.direction {
                Direction::Income => "OTHER_RECEIPT".into(),
                Direction::Expense => "OTHER_PAYMENT".into(),
            },
            date: format_wire_date(transaction.date),
            reference: Some(transaction.reference.clone()),
            description: Some(transaction.description.clone()),
            total_amount: transaction.amount.saturating_add(transaction.vat_or_zero()),
            net_amount: Some(transaction.amount),
            tax_amount: transaction.vat_amount,
            bank_account_id: self.accounts.bank.code_for(&transaction.account).to_string(),
            ledger_account_id: self
                .accounts
                .category_code(transaction.direction, &transaction.category)
                .to_string(),
            tax_rate_id: Some(tax_rate_id(VatTreatment::of(transaction.vat_rate)).into()),
        };

        ProviderTransaction {
            provider_id: ProviderId::Sage,
            transaction_id: transaction.id.clone(),
            reference: transaction.reference.clone(),
            resource: "other_payments".into(),
            body: json!({ "other_payment": serde_json::to_value(record).unwrap_or(Value::Null) }),
        }
    }

    fn from_wire(&self, response: &ProviderResponse) -> DecodedBatch {
        let items = response.body.get("$items").and_then(Value::as_array);
        decode_items(ProviderId::Sage, items, |item| self.decode(item))
    }

    fn list_request(&self, range: &DateRange, page: u32) -> ListRequest {
        ListRequest {
            resource: "other_payments".into(),
            query: vec![
                ("from_date".into(), format_wire_date(range.start)),
                ("to_date".into(), format_wire_date(range.end)),
                ("attributes".into(), "all".into()),
                ("page".into(), page.to_string()),
                ("items_per_page".into(), PAGE_SIZE.to_string()),
            ],
        }
    }

    fn has_more(&self, response: &ProviderResponse, _page: u32) -> bool {
        response.body.get("$next").and_then(Value::as_str).is_some_and(|next| !next.is_empty())
    }

    fn envelope(&self, bodies: Vec<Value>) -> ProviderResponse {
        let items: Vec<Value> = bodies
            .into_iter()
            .map(|body| match body.get(WRAPPER) {
                Some(record) => record.clone(),
                None => body,
            })
            .collect();
        ProviderResponse::new(json!({
            "$total": items.len(),
            "$page": 1,
            "$next": null,
            "$items": items,
        }))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OtherPayment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    transaction_type_id: String,
    date: String,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(serialize_with = "amount_as_decimal", deserialize_with = "wire_amount")]
    total_amount: Money,
    #[serde(
        default,
        serialize_with = "optional_amount_as_decimal",
        deserialize_with = "optional_wire_amount"
    )]
    net_amount: Option<Money>,
    #[serde(
        default,
        serialize_with = "optional_amount_as_decimal",
        deserialize_with = "optional_wire_amount",
        skip_serializing_if = "Option::is_none"
    )]
    tax_amount: Option<Money>,
    bank_account_id: String,
    ledger_account_id: String,
    #[serde(default)]
    tax_rate_id: Option<String>,
}

fn tax_rate_id(treatment: VatTreatment) -> &'static str {
    match treatment {
        VatTreatment::Standard => "ZA_STANDARD",
        VatTreatment::ZeroRated => "ZA_ZERO",
        VatTreatment::Exempt => "ZA_EXEMPT",
    }
}

fn tax_treatment(id: &str) -> VatTreatment {
    match id {
        "ZA_ZERO" => VatTreatment::ZeroRated,
        "ZA_EXEMPT" | "ZA_NO_TAX" => VatTreatment::Exempt,
        _ => VatTreatment::Standard,
    }
}

fn default_accounts() -> AccountMapping {
    AccountMapping {
        income: ChartOfAccounts::new(
            [("sales", "4000"), ("services", "4010"), ("interest", "4900")],
            "4910",
        ),
        expense: ChartOfAccounts::new(
            [
                ("office", "7500"),
                ("rent", "7100"),
                ("travel", "7400"),
                ("bank_fees", "7900"),
                ("utilities", "7200"),
                ("wages", "7000"),
            ],
            "8200",
        ),
        bank: ChartOfAccounts::new([("bank", "1200")], "1200"),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use finsync_domain::VatRate;

    use super::*;

    fn receipt() -> Transaction {
        Transaction {
            id: "tx-3".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            description: "Export order".into(),
            amount: Money::from_cents(80_000),
            direction: Direction::Income,
            category: "sales".into(),
            account: "bank".into(),
            reference: "INV-3".into(),
            vat_amount: None,
            vat_rate: VatRate::ZERO,
        }
    }

    #[test]
    fn create_body_is_wrapped_and_flat() {
        let wire = SageAdapter::default().to_wire(&receipt());
        let record = &wire.body["other_payment"];

        assert_eq!(wire.resource, "other_payments");
        assert_eq!(record["transaction_type_id"], "OTHER_RECEIPT");
        assert_eq!(record["ledger_account_id"], "4000");
        assert_eq!(record["tax_rate_id"], "ZA_ZERO");
        assert_eq!(record["total_amount"], "800.00");
        assert!(record.get("tax_amount").is_none());
    }

    #[test]
    fn net_amount_is_derived_when_absent() {
        let response = ProviderResponse::new(json!({
            "$items": [{
                "id": "sage-1",
                "transaction_type_id": "OTHER_PAYMENT",
                "date": "2024-03-20",
                "reference": "SUP-9",
                "total_amount": "115.00",
                "tax_amount": "15.00",
                "bank_account_id": "1200",
                "ledger_account_id": "7500"
            }],
            "$next": "/other_payments?page=2"
        }));
        let adapter = SageAdapter::default();

        let batch = adapter.from_wire(&response);

        assert!(adapter.has_more(&response, 1));
        let decoded = &batch.transactions[0];
        assert_eq!(decoded.amount, Money::from_cents(10_000));
        assert_eq!(decoded.vat_amount, Some(Money::from_cents(1_500)));
        assert_eq!(decoded.category, "office");
        assert_eq!(decoded.direction, Direction::Expense);
    }

    #[test]
    fn unknown_transaction_types_are_dropped() {
        let response = ProviderResponse::new(json!({
            "$items": [{
                "transaction_type_id": "TRANSFER",
                "date": "2024-03-20",
                "reference": "T-1",
                "total_amount": 10,
                "bank_account_id": "1200",
                "ledger_account_id": "1210"
            }],
            "$next": null
        }));
        let adapter = SageAdapter::default();

        assert_eq!(adapter.from_wire(&response).dropped, 1);
        assert!(!adapter.has_more(&response, 1));
    }

    #[test]
    fn overflowing_net_derivation_drops_only_that_record() {
        let response = ProviderResponse::new(json!({
            "$items": [
                {
                    "id": "sage-huge",
                    "transaction_type_id": "OTHER_PAYMENT",
                    "date": "2024-03-20",
                    "reference": "SUP-HUGE",
                    "total_amount": "-90000000000000000.00",
                    "tax_amount": "9000000000000000.00",
                    "bank_account_id": "1200",
                    "ledger_account_id": "7500"
                },
                {
                    "id": "sage-2",
                    "transaction_type_id": "OTHER_PAYMENT",
                    "date": "2024-03-20",
                    "reference": "SUP-10",
                    "total_amount": "23.00",
                    "tax_amount": "3.00",
                    "bank_account_id": "1200",
                    "ledger_account_id": "7500"
                }
            ],
            "$next": null
        }));

        let batch = SageAdapter::default().from_wire(&response);

        assert_eq!(batch.dropped, 1);
        assert_eq!(batch.transactions.len(), 1);
        assert_eq!(batch.transactions[0].amount, Money::from_cents(2_000));
    }
}
