//! Xero bank transactions
//!
//! Each transaction becomes a `RECEIVE` or `SPEND` bank transaction with a
//! single tax-exclusive line item.

use finsync_core::FormatAdapter;
use finsync_domain::{
    DateRange, Direction, ListRequest, Money, ProviderId, ProviderResponse, ProviderTransaction,
    DecodedBatch, Transaction,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    amount_as_decimal, decode_items, format_wire_date, optional_amount_as_decimal,
    optional_wire_amount, parse_wire_date, wire_amount, AccountMapping, ChartOfAccounts,
    VatTreatment, PAGE_SIZE,
};

const RESOURCE: &str = "BankTransactions";

#[derive(Debug, Clone)]
pub struct XeroAdapter {
    accounts: AccountMapping,
}

impl Default for XeroAdapter {
    fn default() -> Self {
        Self::with_accounts(default_accounts())
    }
}

impl XeroAdapter {
    pub fn with_accounts(accounts: AccountMapping) -> Self {
        Self { accounts }
    }

    fn decode(&self, value: &Value) -> Option<Transaction> {
        let record: BankTransaction = serde_json::from_value(value.clone()).ok()?;
        let direction = match record.kind.as_str() {
            "RECEIVE" => Direction::Income,
            "SPEND" => Direction::Expense,
            _ => return None,
        };
        let date = record
            .date_string
            .as_deref()
            .or(record.date.as_deref())
            .and_then(parse_wire_date)?;
        let first = record.line_items.first()?;

        let amount = Money::checked_sum(record.line_items.iter().map(|line| line.line_amount))?;
        let vat_amount = if record.line_items.iter().any(|line| line.tax_amount.is_some()) {
            Some(Money::checked_sum(record.line_items.iter().filter_map(|line| line.tax_amount))?)
        } else {
            None
        };
        let reference = record.reference.filter(|r| !r.trim().is_empty());
        let id = record.id.or_else(|| reference.clone())?;

        Some(Transaction {
            reference: reference.unwrap_or_else(|| id.clone()),
            id,
            date,
            description: first.description.clone().unwrap_or_default(),
            amount,
            direction,
            category: self.accounts.category_name(direction, &first.account_code),
            account: self.accounts.bank.name_for(&record.bank_account.code),
            vat_amount,
            vat_rate: tax_treatment(first.tax_type.as_deref()).rate(),
        })
    }
}

impl FormatAdapter for XeroAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::Xero
    }

    fn to_wire(&self, transaction: &Transaction) -> ProviderTransaction {
        let record = BankTransaction {
            id: None,
            kind: match transaction.direction {
                Direction::Income => "RECEIVE".into(),
                Direction::Expense => "SPEND".into(),
            },
            reference: Some(transaction.reference.clone()),
            date: Some(format_wire_date(transaction.date)),
            date_string: None,
            line_amount_types: Some("Exclusive".into()),
            bank_account: AccountCode {
                code: self.accounts.bank.code_for(&transaction.account).to_string(),
            },
            line_items: vec![LineItem {
                description: Some(transaction.description.clone()),
                quantity: Some(1),
                unit_amount: Some(transaction.amount),
                line_amount: transaction.amount,
                account_code: self
                    .accounts
                    .category_code(transaction.direction, &transaction.category)
                    .to_string(),
                tax_type: Some(
                    tax_type(VatTreatment::of(transaction.vat_rate), transaction.direction).into(),
                ),
                tax_amount: transaction.vat_amount,
            }],
        };

        ProviderTransaction {
            provider_id: ProviderId::Xero,
            transaction_id: transaction.id.clone(),
            reference: transaction.reference.clone(),
            resource: RESOURCE.into(),
            body: serde_json::to_value(record).unwrap_or(Value::Null),
        }
    }

    fn from_wire(&self, response: &ProviderResponse) -> DecodedBatch {
        let items = response.body.get(RESOURCE).and_then(Value::as_array);
        decode_items(ProviderId::Xero, items, |item| self.decode(item))
    }

    fn list_request(&self, range: &DateRange, page: u32) -> ListRequest {
        ListRequest {
            resource: RESOURCE.into(),
            query: vec![
                (
                    "where".into(),
                    format!(
                        "Date >= DateTime({}) && Date <= DateTime({})",
                        range.start.format("%Y,%m,%d"),
                        range.end.format("%Y,%m,%d")
                    ),
                ),
                ("order".into(), "Date ASC".into()),
                ("page".into(), page.to_string()),
                ("pageSize".into(), PAGE_SIZE.to_string()),
            ],
        }
    }

    fn has_more(&self, response: &ProviderResponse, _page: u32) -> bool {
        response
            .body
            .get(RESOURCE)
            .and_then(Value::as_array)
            .is_some_and(|items| items.len() >= PAGE_SIZE as usize)
    }

    fn envelope(&self, bodies: Vec<Value>) -> ProviderResponse {
        ProviderResponse::new(json!({ "Status": "OK", "BankTransactions": bodies }))
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BankTransaction {
    #[serde(rename = "BankTransactionID", default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(rename = "Type")]
    kind: String,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    line_amount_types: Option<String>,
    bank_account: AccountCode,
    line_items: Vec<LineItem>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AccountCode {
    code: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LineItem {
    #[serde(default)]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quantity: Option<u32>,
    #[serde(
        default,
        serialize_with = "optional_amount_as_decimal",
        deserialize_with = "optional_wire_amount",
        skip_serializing_if = "Option::is_none"
    )]
    unit_amount: Option<Money>,
    #[serde(serialize_with = "amount_as_decimal", deserialize_with = "wire_amount")]
    line_amount: Money,
    account_code: String,
    #[serde(default)]
    tax_type: Option<String>,
    #[serde(
        default,
        serialize_with = "optional_amount_as_decimal",
        deserialize_with = "optional_wire_amount",
        skip_serializing_if = "Option::is_none"
    )]
    tax_amount: Option<Money>,
}

fn tax_type(treatment: VatTreatment, direction: Direction) -> &'static str {
    match (treatment, direction) {
        (VatTreatment::Standard, Direction::Income) => "OUTPUT",
        (VatTreatment::Standard, Direction::Expense) => "INPUT",
        (VatTreatment::ZeroRated, Direction::Income) => "ZERORATEDOUTPUT",
        (VatTreatment::ZeroRated, Direction::Expense) => "ZERORATEDINPUT",
        (VatTreatment::Exempt, Direction::Income) => "EXEMPTOUTPUT",
        (VatTreatment::Exempt, Direction::Expense) => "EXEMPTINPUT",
    }
}

fn tax_treatment(tax_type: Option<&str>) -> VatTreatment {
    match tax_type {
        Some(code) if code.starts_with("EXEMPT") || code == "NONE" => VatTreatment::Exempt,
        Some(code) if code.starts_with("ZERORATED") => VatTreatment::ZeroRated,
        _ => VatTreatment::Standard,
    }
}

fn default_accounts() -> AccountMapping {
    AccountMapping {
        income: ChartOfAccounts::new(
            [("sales", "200"), ("services", "210"), ("interest", "270")],
            "260",
        ),
        expense: ChartOfAccounts::new(
            [
                ("office", "453"),
                ("rent", "469"),
                ("travel", "493"),
                ("bank_fees", "404"),
                ("utilities", "445"),
                ("wages", "477"),
            ],
            "429",
        ),
        bank: ChartOfAccounts::new([("bank", "090")], "090"),
    }
}
