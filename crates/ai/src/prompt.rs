//! Structured prompts: the facts a message must convey, with the instructions for a
//! language model to write it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use procura_core::Money;

/// One quote as presented to the analyst.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteLine {
    pub vendor_name: String,
    pub price: Money,
    pub delivery_days: i32,
    pub rating: f64,
    /// Advisory weighted score, 0 ..= 100.
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Prompt {
    RfqRequest {
        rfq_number: String,
        vendor_name: String,
        vendor_email: String,
        item_name: String,
        quantity: i64,
    },
    QuoteAnalysis {
        item_name: String,
        quotes: Vec<QuoteLine>,
    },
    ApprovalRequest {
        item_name: String,
        vendor_name: String,
        quantity: i64,
        unit_price: Money,
        total: Money,
        delivery_days: i32,
        analysis: Option<String>,
    },
    PaymentRequest {
        po_number: String,
        vendor_name: String,
        amount: Money,
        payment_terms: String,
    },
    LogisticsHandoff {
        po_number: String,
        vendor_name: String,
        item_name: String,
        quantity: i64,
        amount: Money,
        expected_delivery: NaiveDate,
        delivery_days: i32,
    },
}

impl Prompt {
    pub fn kind(&self) -> &'static str {
        match self {
            Prompt::RfqRequest { .. } => "rfq_request",
            Prompt::QuoteAnalysis { .. } => "quote_analysis",
            Prompt::ApprovalRequest { .. } => "approval_request",
            Prompt::PaymentRequest { .. } => "payment_request",
            Prompt::LogisticsHandoff { .. } => "logistics_handoff",
        }
    }

    /// Model-facing instruction text.
    pub fn render(&self) -> String {
        match self {
            Prompt::RfqRequest {
                rfq_number,
                vendor_name,
                vendor_email,
                item_name,
                quantity,
            } => format!(
                "You are a professional procurement specialist.\n\n\
                 Generate a Request for Quotation (RFQ) email to {vendor_name} ({vendor_email}).\n\n\
                 RFQ number: {rfq_number}\n\
                 Items requested:\n- {item_name}: {quantity} units\n\n\
                 Requirements:\n\
                 - Professional RFQ format\n\
                 - Include clear item descriptions and quantities\n\
                 - Request quote validity period (30 days)\n\
                 - Request delivery timeline\n\
                 - Set response deadline (5 business days)\n\
                 - One email only, no duplicates\n\n\
                 Generate the email body:"
            ),
            Prompt::QuoteAnalysis { item_name, quotes } => {
                let lines: Vec<String> = quotes
                    .iter()
                    .map(|q| {
                        format!(
                            "Vendor: {}, Price: {}, Delivery: {} days, Rating: {}/5, Score: {:.1}",
                            q.vendor_name, q.price, q.delivery_days, q.rating, q.score
                        )
                    })
                    .collect();
                format!(
                    "You are a procurement analyst.\n\n\
                     Analyze these vendor quotes for {item_name}:\n\n{}\n\n\
                     Criteria for evaluation:\n\
                     1. Price competitiveness (40% weight)\n\
                     2. Delivery timeline (30% weight)\n\
                     3. Vendor rating/reliability (30% weight)\n\n\
                     Provide:\n\
                     - Top recommendation with justification\n\
                     - Risk assessment for top 3 quotes\n\
                     - Cost-benefit analysis\n\n\
                     Be concise and data-driven.",
                    lines.join("\n")
                )
            }
            Prompt::ApprovalRequest {
                item_name,
                vendor_name,
                quantity,
                unit_price,
                total,
                delivery_days,
                analysis,
            } => format!(
                "You are a procurement manager requesting purchase approval.\n\n\
                 Generate a professional approval request email to the midlevel manager.\n\n\
                 Details:\n\
                 - Item: {item_name}\n\
                 - Vendor: {vendor_name}\n\
                 - Quantity: {quantity}\n\
                 - Quote Price: {unit_price} per unit ({total} total)\n\
                 - Delivery Time: {delivery_days} days\n\
                 - Analysis: {}\n\n\
                 Email should include:\n\
                 - Cost justification\n\
                 - Delivery timeline impact\n\
                 - Approval request with decision deadline (next business day)\n\
                 - Next steps after approval\n\n\
                 Be professional and concise.",
                analysis.as_deref().unwrap_or("not available")
            ),
            Prompt::PaymentRequest {
                po_number,
                vendor_name,
                amount,
                payment_terms,
            } => format!(
                "You are a procurement finance coordinator.\n\n\
                 Generate a payment request/authorization email to the finance department.\n\n\
                 PO Details:\n\
                 - PO Number: {po_number}\n\
                 - Vendor: {vendor_name}\n\
                 - Amount: {amount}\n\
                 - Payment Terms: {payment_terms}\n\n\
                 Email should include:\n\
                 - Clear invoice/payment details\n\
                 - Payment timeline (process within 3 business days)\n\
                 - Approval chain reference\n\n\
                 Keep it professional and concise."
            ),
            Prompt::LogisticsHandoff {
                po_number,
                vendor_name,
                item_name,
                quantity,
                amount,
                expected_delivery,
                delivery_days,
            } => format!(
                "You are a procurement specialist handing off a purchase order to logistics.\n\n\
                 Generate a detailed handoff email to the logistics team.\n\n\
                 PO Information:\n\
                 - PO Number: {po_number}\n\
                 - Vendor: {vendor_name}\n\
                 - Item: {item_name}\n\
                 - Quantity: {quantity}\n\
                 - Total Amount: {amount}\n\
                 - Expected Delivery: {expected_delivery}\n\
                 - Lead Time: {delivery_days} days\n\n\
                 Email should include:\n\
                 - Instructions for receiving and inspection\n\
                 - Follow-up requirements (tracking, status updates)\n\n\
                 Make it action-oriented and clear."
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_prompts_carry_the_facts() {
        let prompt = Prompt::PaymentRequest {
            po_number: "PO-1".into(),
            vendor_name: "Acme".into(),
            amount: Money::from_major(152).unwrap(),
            payment_terms: "NET 30".into(),
        };
        let text = prompt.render();
        assert!(text.contains("PO-1"));
        assert!(text.contains("$152.00"));
        assert!(text.contains("NET 30"));
        assert_eq!(prompt.kind(), "payment_request");
    }

    #[test]
    fn analysis_lists_every_quote() {
        let quote = |name: &str, price| QuoteLine {
            vendor_name: name.into(),
            price: Money::from_major(price).unwrap(),
            delivery_days: 5,
            rating: 4.0,
            score: 80.0,
        };
        let prompt = Prompt::QuoteAnalysis {
            item_name: "Widget".into(),
            quotes: vec![quote("V1", 10), quote("V2", 8)],
        };
        let text = prompt.render();
        assert!(text.contains("Vendor: V1, Price: $10.00"));
        assert!(text.contains("Vendor: V2, Price: $8.00"));
    }
}
