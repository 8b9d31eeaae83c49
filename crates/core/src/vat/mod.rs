//! VAT aggregation, return signing and filing with the tax authority

pub mod calculator;
pub mod ports;
pub mod submission;

pub use calculator::calculate_vat;
pub use submission::{
    sign_return, signing_payload, verify_signature, SubmissionBuilder, SubmissionPayload,
    SubmissionService,
};
