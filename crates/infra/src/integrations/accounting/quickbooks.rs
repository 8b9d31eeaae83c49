//! QuickBooks Online journal entries
//!
//! A transaction posts as a balanced two-line journal entry: income debits
//! the bank and credits the income account, expenses the other way round.
//! Lists go through the `query` endpoint with `STARTPOSITION` paging.

use finsync_core::FormatAdapter;
use finsync_domain::{
    DateRange, DecodedBatch, Direction, ListRequest, Money, ProviderId, ProviderResponse,
    ProviderTransaction, Transaction,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    amount_as_decimal, decode_items, format_wire_date, parse_wire_date, wire_amount,
    AccountMapping, ChartOfAccounts, VatTreatment, PAGE_SIZE,
};

const ENTITY: &str = "JournalEntry";
const LINE_DETAIL: &str = "JournalEntryLineDetail";

#[derive(Debug, Clone)]
pub struct QuickBooksAdapter {
    accounts: AccountMapping,
}

impl Default for QuickBooksAdapter {
    fn default() -> Self {
        Self::with_accounts(default_accounts())
    }
}

impl QuickBooksAdapter {
    pub fn with_accounts(accounts: AccountMapping) -> Self {
        Self { accounts }
    }

    fn decode(&self, value: &Value) -> Option<Transaction> {
        let entry: JournalEntry = serde_json::from_value(value.clone()).ok()?;
        let date = parse_wire_date(&entry.txn_date)?;

        let total = |posting: Posting| -> Option<Money> {
            Money::checked_sum(
                entry.line.iter().filter(|l| l.detail.posting_type == posting).map(|l| l.amount),
            )
        };
        let debits = total(Posting::Debit)?;
        if Some(debits) != total(Posting::Credit) || debits.is_zero() {
            return None;
        }

        let bank_line = entry
            .line
            .iter()
            .find(|l| self.accounts.bank.contains_code(&l.detail.account_ref.value))?;
        let direction = match bank_line.detail.posting_type {
            Posting::Debit => Direction::Income,
            Posting::Credit => Direction::Expense,
        };
        let category_line = entry
            .line
            .iter()
            .find(|l| l.detail.posting_type != bank_line.detail.posting_type)?;

        let reference = entry.doc_number.filter(|r| !r.trim().is_empty());
        let id = entry.id.or_else(|| reference.clone())?;
        let treatment = category_line
            .detail
            .tax_code_ref
            .as_ref()
            .map_or(VatTreatment::Standard, |code| tax_treatment(&code.value));

        Some(Transaction {
            reference: reference.unwrap_or_else(|| id.clone()),
            id,
            date,
            description: entry
                .private_note
                .or_else(|| category_line.description.clone())
                .unwrap_or_default(),
            amount: debits,
            direction,
            category: self.accounts.category_name(direction, &category_line.detail.account_ref.value),
            account: self.accounts.bank.name_for(&bank_line.detail.account_ref.value),
            vat_amount: entry.txn_tax_detail.map(|detail| detail.total_tax),
            vat_rate: treatment.rate(),
        })
    }
}

impl FormatAdapter for QuickBooksAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::QuickBooks
    }

    fn to_wire(&self, transaction: &Transaction) -> ProviderTransaction {
        let bank = self.accounts.bank.code_for(&transaction.account);
        let category = self.accounts.category_code(transaction.direction, &transaction.category);
        let tax = tax_code(VatTreatment::of(transaction.vat_rate));
        let (debit, credit) = match transaction.direction {
            Direction::Income => ((bank, None), (category, Some(tax))),
            Direction::Expense => ((category, Some(tax)), (bank, None)),
        };
        let line = |id: &str, posting: Posting, (account, tax): (&str, Option<&str>)| JournalLine {
            id: Some(id.to_string()),
            description: Some(transaction.description.clone()),
            amount: transaction.amount,
            detail_type: LINE_DETAIL.into(),
            detail: LineDetail {
                posting_type: posting,
                account_ref: Reference { value: account.to_string() },
                tax_code_ref: tax.map(|code| Reference { value: code.to_string() }),
            },
        };
        let lines = vec![line("0", Posting::Debit, debit), line("1", Posting::Credit, credit)];

        let entry = JournalEntry {
            id: None,
            doc_number: Some(transaction.reference.clone()),
            txn_date: format_wire_date(transaction.date),
            private_note: Some(transaction.description.clone()),
            line: lines,
            txn_tax_detail: transaction.vat_amount.map(|total_tax| TaxDetail { total_tax }),
        };

        ProviderTransaction {
            provider_id: ProviderId::QuickBooks,
            transaction_id: transaction.id.clone(),
            reference: transaction.reference.clone(),
            resource: "journalentry".into(),
            body: serde_json::to_value(entry).unwrap_or(Value::Null),
        }
    }

    fn from_wire(&self, response: &ProviderResponse) -> DecodedBatch {
        let items = response.body.pointer("/QueryResponse/JournalEntry").and_then(Value::as_array);
        decode_items(ProviderId::QuickBooks, items, |item| self.decode(item))
    }

    fn list_request(&self, range: &DateRange, page: u32) -> ListRequest {
        let start_position = page.saturating_sub(1) * PAGE_SIZE + 1;
        ListRequest {
            resource: "query".into(),
            query: vec![(
                "query".into(),
                format!(
                    "SELECT * FROM {ENTITY} WHERE TxnDate >= '{}' AND TxnDate <= '{}' \
                     ORDERBY TxnDate STARTPOSITION {start_position} MAXRESULTS {PAGE_SIZE}",
                    format_wire_date(range.start),
                    format_wire_date(range.end),
                ),
            )],
        }
    }

    fn has_more(&self, response: &ProviderResponse, _page: u32) -> bool {
        response
            .body
            .pointer("/QueryResponse/JournalEntry")
            .and_then(Value::as_array)
            .is_some_and(|items| items.len() >= PAGE_SIZE as usize)
    }

    fn envelope(&self, bodies: Vec<Value>) -> ProviderResponse {
        let count = bodies.len();
        ProviderResponse::new(json!({
            "QueryResponse": {
                "JournalEntry": bodies,
                "startPosition": 1,
                "maxResults": count,
            }
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Posting {
    Debit,
    Credit,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JournalEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default)]
    doc_number: Option<String>,
    txn_date: String,
    #[serde(default)]
    private_note: Option<String>,
    line: Vec<JournalLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    txn_tax_detail: Option<TaxDetail>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JournalLine {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(serialize_with = "amount_as_decimal", deserialize_with = "wire_amount")]
    amount: Money,
    detail_type: String,
    #[serde(rename = "JournalEntryLineDetail")]
    detail: LineDetail,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LineDetail {
    posting_type: Posting,
    account_ref: Reference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tax_code_ref: Option<Reference>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Reference {
    value: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TaxDetail {
    #[serde(serialize_with = "amount_as_decimal", deserialize_with = "wire_amount")]
    total_tax: Money,
}

fn tax_code(treatment: VatTreatment) -> &'static str {
    match treatment {
        VatTreatment::Standard => "TAX",
        VatTreatment::ZeroRated => "ZR",
        VatTreatment::Exempt => "EX",
    }
}

fn tax_treatment(code: &str) -> VatTreatment {
    match code {
        "ZR" => VatTreatment::ZeroRated,
        "EX" | "NON" => VatTreatment::Exempt,
        _ => VatTreatment::Standard,
    }
}

fn default_accounts() -> AccountMapping {
    AccountMapping {
        income: ChartOfAccounts::new([("sales", "79"), ("services", "85"), ("interest", "82")], "83"),
        expense: ChartOfAccounts::new(
            [
                ("office", "15"),
                ("rent", "17"),
                ("travel", "58"),
                ("bank_fees", "8"),
                ("utilities", "24"),
                ("wages", "54"),
            ],
            "31",
        ),
        bank: ChartOfAccounts::new([("bank", "35")], "35"),
    }
}
