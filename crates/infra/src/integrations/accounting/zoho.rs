//! Zoho Books bank transactions (deposits and expenses)

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

const RESOURCE: &str = "banktransactions";

#[derive(Debug, Clone)]
pub struct ZohoBooksAdapter {
    accounts: AccountMapping,
}

impl Default for ZohoBooksAdapter {
    fn default() -> Self {
        Self::with_accounts(default_accounts())
    }
}

impl ZohoBooksAdapter {
    pub fn with_accounts(accounts: AccountMapping) -> Self {
        Self { accounts }
    }

    fn decode(&self, value: &Value) -> Option<Transaction> {
        let record: BankTransaction = serde_json::from_value(value.clone()).ok()?;
        let (direction, category_code) = match record.transaction_type.as_str() {
            "deposit" => (Direction::Income, record.from_account_id?),
            "expense" => (Direction::Expense, record.to_account_id?),
            _ => return None,
        };
        let reference = record.reference_number.filter(|r| !r.trim().is_empty());
        let id = record.transaction_id.or_else(|| reference.clone())?;

        Some(Transaction {
            reference: reference.unwrap_or_else(|| id.clone()),
            id,
            date: parse_wire_date(&record.date)?,
            description: record.description.unwrap_or_default(),
            amount: record.amount,
            direction,
            category: self.accounts.category_name(direction, &category_code),
            account: self.accounts.bank.name_for(&record.account_id),
            vat_amount: record.tax_amount,
            vat_rate: record.tax_name.as_deref().map_or(VatTreatment::Standard, tax_treatment).rate(),
        })
    }
}

impl FormatAdapter for ZohoBooksAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::ZohoBooks
    }

    fn to_wire(&self, transaction: &Transaction) -> ProviderTransaction {
        let category =
            Some(self.accounts.category_code(transaction.direction, &transaction.category).to_string());
        let (transaction_type, from_account_id, to_account_id) = match transaction.direction {
            Direction::Income => ("deposit", category, None),
            Direction::Expense => ("expense", None, category),
        };

        let record = BankTransaction {
            transaction_id: None,
            transaction_type: transaction_type.into(),
            date: format_wire_date(transaction.date),
            reference_number: Some(transaction.reference.clone()),
            description: Some(transaction.description.clone()),
            amount: transaction.amount,
            account_id: self.accounts.bank.code_for(&transaction.account).to_string(),
            from_account_id,
            to_account_id,
            tax_amount: transaction.vat_amount,
            tax_name: Some(tax_name(VatTreatment::of(transaction.vat_rate)).into()),
        };

        ProviderTransaction {
            provider_id: ProviderId::ZohoBooks,
            transaction_id: transaction.id.clone(),
            reference: transaction.reference.clone(),
            resource: RESOURCE.into(),
            body: serde_json::to_value(record).unwrap_or(Value::Null),
        }
    }

    fn from_wire(&self, response: &ProviderResponse) -> DecodedBatch {
        let items = response.body.get(RESOURCE).and_then(Value::as_array);
        decode_items(ProviderId::ZohoBooks, items, |item| self.decode(item))
    }

    fn list_request(&self, range: &DateRange, page: u32) -> ListRequest {
        ListRequest {
            resource: RESOURCE.into(),
            query: vec![
                ("date_start".into(), format_wire_date(range.start)),
                ("date_end".into(), format_wire_date(range.end)),
                ("page".into(), page.to_string()),
                ("per_page".into(), PAGE_SIZE.to_string()),
            ],
        }
    }

    fn has_more(&self, response: &ProviderResponse, _page: u32) -> bool {
        response
            .body
            .pointer("/page_context/has_more_page")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn envelope(&self, bodies: Vec<Value>) -> ProviderResponse {
        ProviderResponse::new(json!({
            "code": 0,
            "message": "success",
            "banktransactions": bodies,
            "page_context": { "page": 1, "per_page": PAGE_SIZE, "has_more_page": false },
        }))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct BankTransaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transaction_id: Option<String>,
    transaction_type: String,
    date: String,
    #[serde(default)]
    reference_number: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(serialize_with = "amount_as_decimal", deserialize_with = "wire_amount")]
    amount: Money,
    account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    from_account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    to_account_id: Option<String>,
    #[serde(
        default,
        serialize_with = "optional_amount_as_decimal",
        deserialize_with = "optional_wire_amount",
        skip_serializing_if = "Option::is_none"
    )]
    tax_amount: Option<Money>,
    #[serde(default)]
    tax_name: Option<String>,
}

fn tax_name(treatment: VatTreatment) -> &'static str {
    match treatment {
        VatTreatment::Standard => "Standard Rate",
        VatTreatment::ZeroRated => "Zero Rate",
        VatTreatment::Exempt => "Exempt",
    }
}

fn tax_treatment(name: &str) -> VatTreatment {
    match name.trim().to_ascii_lowercase().as_str() {
        "zero rate" => VatTreatment::ZeroRated,
        "exempt" | "out of scope" => VatTreatment::Exempt,
        _ => VatTreatment::Standard,
    }
}

fn default_accounts() -> AccountMapping {
    AccountMapping {
        income: ChartOfAccounts::new(
            [("sales", "3000001"), ("services", "3000002"), ("interest", "3000003")],
            "3000099",
        ),
        expense: ChartOfAccounts::new(
            [
                ("office", "4000001"),
                ("rent", "4000002"),
                ("travel", "4000003"),
                ("bank_fees", "4000004"),
                ("utilities", "4000005"),
                ("wages", "4000006"),
            ],
            "4000099",
        ),
        bank: ChartOfAccounts::new([("bank", "1000001")], "1000001"),
    }
}
