//! Deterministic prose for development, tests, and as a fallback when no model is
//! reachable.

use async_trait::async_trait;

use crate::error::AiError;
use crate::generator::TextGenerator;
use crate::prompt::Prompt;

#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateTextGenerator;

impl TemplateTextGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn compose(&self, prompt: &Prompt) -> Result<String, AiError> {
        let text = match prompt {
            Prompt::RfqRequest {
                rfq_number,
                vendor_name,
                item_name,
                quantity,
                ..
            } => format!(
                "Dear {vendor_name},\n\n\
                 We request a quotation for {quantity} units of {item_name} (reference {rfq_number}).\n\
                 Please include unit price, delivery timeline, and a quote validity of 30 days.\n\
                 We would appreciate your response within 5 business days.\n\n\
                 Regards,\nProcurement"
            ),
            Prompt::QuoteAnalysis { item_name, quotes } => {
                if quotes.is_empty() {
                    return Err(AiError::InvalidInput("no quotes to analyze".into()));
                }
                let mut lines = vec![format!("Quote comparison for {item_name}:")];
                for q in quotes {
                    lines.push(format!(
                        "- {}: {} per unit, {} days, rating {}/5, weighted score {:.1}",
                        q.vendor_name, q.price, q.delivery_days, q.rating, q.score
                    ));
                }
                if let Some(cheapest) = quotes.iter().min_by_key(|q| q.price) {
                    lines.push(format!(
                        "Lowest price: {} at {}.",
                        cheapest.vendor_name, cheapest.price
                    ));
                }
                lines.join("\n")
            }
            Prompt::ApprovalRequest {
                item_name,
                vendor_name,
                quantity,
                unit_price,
                total,
                delivery_days,
                analysis,
            } => {
                let mut body = format!(
                    "Approval requested: {quantity} units of {item_name} from {vendor_name} \
                     at {unit_price} per unit ({total} total), delivery in {delivery_days} days.\n\
                     Please approve or reject by the next business day."
                );
                if let Some(analysis) = analysis {
                    body.push_str("\n\n");
                    body.push_str(analysis);
                }
                body
            }
            Prompt::PaymentRequest {
                po_number,
                vendor_name,
                amount,
                payment_terms,
            } => format!(
                "Finance team,\n\n\
                 Please authorize payment of {amount} to {vendor_name} for purchase order \
                 {po_number} ({payment_terms}).\n\
                 Processing is requested within 3 business days.\n\n\
                 Regards,\nProcurement"
            ),
            Prompt::LogisticsHandoff {
                po_number,
                vendor_name,
                item_name,
                quantity,
                expected_delivery,
                delivery_days,
                ..
            } => format!(
                "Logistics team,\n\n\
                 Purchase order {po_number} has been issued to {vendor_name} for {quantity} units \
                 of {item_name}.\n\
                 Expected delivery: {expected_delivery} ({delivery_days} days lead time).\n\
                 Please track the shipment and inspect goods on receipt.\n\n\
                 Regards,\nProcurement"
            ),
        };
        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for TemplateTextGenerator {
    async fn generate(&self, prompt: &Prompt) -> Result<String, AiError> {
        self.compose(prompt)
    }

    fn name(&self) -> &'static str {
        "template"
    }
}
