//! System prompt assembly.
//!
//! Each request picks a base prompt profile, then the rep's sales context is
//! rendered as two dated JSON blocks and substituted for the context
//! placeholder.

use chrono::{Local, NaiveDate};
use serde_json::{json, Value};
use tracing::{debug, warn};

use salesdesk_core::types::{ModelMessage, OrderDetail, Role, SalesContext};

/// Marker in the base prompts replaced by the rendered sales context.
pub const CONTEXT_PLACEHOLDER: &str = "[SALES REP CONTEXT HERE]";

const PROTECTIVE_PROMPT: &str = include_str!("../prompts/protective.txt");
const FOOD_PROMPT: &str = include_str!("../prompts/food.txt");

const NA: &str = "N/A";
const UNKNOWN: &str = "Unknown";

// =============================================================================
// Profiles
// =============================================================================

/// Which base system prompt applies to a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PromptProfile {
    #[default]
    Protective,
    Food,
}

impl PromptProfile {
    /// Profile for a message request, judged by the page it came from.
    pub fn from_referer(referer: Option<&str>) -> Self {
        match referer {
            Some(r) if r.to_ascii_lowercase().contains("food") => PromptProfile::Food,
            _ => PromptProfile::Protective,
        }
    }

    pub fn base_prompt(self) -> &'static str {
        match self {
            PromptProfile::Protective => PROTECTIVE_PROMPT.trim(),
            PromptProfile::Food => FOOD_PROMPT.trim(),
        }
    }

    /// Food answers come from the prompt alone, without document grounding.
    pub fn uses_grounding(self) -> bool {
        self == PromptProfile::Protective
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PromptProfile::Protective => "protective",
            PromptProfile::Food => "food",
        }
    }
}

// =============================================================================
// PromptBuilder
// =============================================================================

/// Builds system prompts and trims model conversations.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    /// Non-system messages kept in each completion request.
    pub history_limit: usize,
}

impl PromptBuilder {
    pub fn new(history_limit: usize) -> Self {
        Self { history_limit }
    }

    /// System prompt for `profile` with today's sales context.
    pub fn system_prompt(&self, profile: PromptProfile, ctx: &SalesContext) -> String {
        self.system_prompt_on(profile, ctx, Local::now().date_naive())
    }

    /// System prompt with the context blocks dated `date`.
    ///
    /// Without real sales data the base prompt is returned untouched.
    pub fn system_prompt_on(
        &self,
        profile: PromptProfile,
        ctx: &SalesContext,
        date: NaiveDate,
    ) -> String {
        let base = profile.base_prompt();
        if !base.contains(CONTEXT_PLACEHOLDER) {
            warn!(
                profile = profile.as_str(),
                "System prompt missing sales context placeholder; no sales context will be included"
            );
        }
        if !ctx.has_sales_rep_data() {
            debug!(profile = profile.as_str(), "No sales rep data, using base prompt");
            return base.to_string();
        }

        base.replace(CONTEXT_PLACEHOLDER, &render_context(ctx, date))
    }

    /// Keep the leading system message and the last `history_limit` others.
    ///
    /// A conversation that does not start with a system message gets the
    /// base prompt of `profile` prepended.
    pub fn truncate_messages(
        &self,
        messages: &[ModelMessage],
        profile: PromptProfile,
    ) -> Vec<ModelMessage> {
        let (system, rest) = match messages.split_first() {
            Some((first, rest)) if first.role == Role::System => (first.clone(), rest),
            _ => {
                warn!("No system message found at start of messages");
                (ModelMessage::system(profile.base_prompt()), messages)
            }
        };

        let skip = rest.len().saturating_sub(self.history_limit);
        std::iter::once(system)
            .chain(rest[skip..].iter().cloned())
            .collect()
    }
}

// =============================================================================
// Context rendering
// =============================================================================

fn render_context(ctx: &SalesContext, date: NaiveDate) -> String {
    let date = date.format("%Y-%m-%d");
    let mut sections = Vec::with_capacity(2);

    sections.push(format!(
        "\nSales Overview as of {}:\n\n{}",
        date,
        pretty(&metrics_json(ctx))
    ));

    if !ctx.summary.orders.is_empty() {
        let orders: Vec<Value> = ctx.summary.orders.iter().map(order_json).collect();
        sections.push(format!(
            "\nDetailed Order Information as of {}:\n\n{}",
            date,
            pretty(&json!({ "orders": orders }))
        ));
    }

    sections.join("\n")
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn metrics_json(ctx: &SalesContext) -> Value {
    let s = &ctx.summary;
    json!({
        "metrics": {
            "total_orders": s.total_orders,
            "blocked_orders": s.blocked_orders,
            "total_order_quantity": s.total_order_quantity,
            "total_open_quantity": s.total_open_quantity,
            "execution_status": s.execution_status,
            "stock_availability": {
                "claimed": s.stock_availability.claimed,
                "not_claimed": s.stock_availability.not_claimed,
            },
            "sales_documents": {
                "total_value_usd": s.sales_documents.total_value_usd,
                "total_value_dc": s.sales_documents.total_value_dc,
                "types": s.sales_documents.types,
            },
            "territories": {
                "companies": s.territories.companies,
                "sales_orgs": s.territories.sales_orgs,
                "plants": s.territories.plants,
                "divisions": s.territories.divisions,
            },
            "customer_data": {
                "unique_sold_to": s.customer_data.sold_to_parties.len(),
                "unique_ship_to": s.customer_data.ship_to_parties.len(),
                "countries": s.customer_data.countries,
                "regions": s.customer_data.regions,
            },
            "delivery_metrics": {
                "on_time": s.delivery_metrics.on_time,
                "delayed": s.delivery_metrics.delayed,
                "reliability_scores": s.delivery_metrics.reliability_scores,
            },
        }
    })
}

/// `value`, or `fallback` when empty.
fn or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

fn opt<'a>(value: &'a Option<String>, fallback: &'a str) -> &'a str {
    value.as_deref().map(|v| or(v, fallback)).unwrap_or(fallback)
}

fn order_json(order: &OrderDetail) -> Value {
    let a = &order.additional_info;
    json!({
        "order_number": or(&order.order_number, NA),
        "execution_status": or(&order.execution_status, UNKNOWN),
        "customer_classification": or(&order.customer_classification, UNKNOWN),
        "blocked_header": or(&order.blocked_header, NA),
        "order_quantity": opt(&order.order_quantity, "0"),
        "open_quantity": opt(&order.open_quantity, "0"),
        "value_usd": format_usd(order.value_usd),
        "value_dc": opt(&order.value_dc, "0"),
        "document_currency": or(&a.document_currency, NA),
        "payment_terms": or(&a.payment_terms, NA),
        "incoterms": or(&a.incoterms, NA),
        "stock_claimed": opt(&order.stock_claimed, NA),
        "delivery_number": or(&order.delivery_number, NA),
        "delivery_created_on": opt(&order.delivery_created_on, NA),
        "sales_doc_type": opt(&order.sales_doc_type, NA),
        "company_code": opt(&order.company_code, NA),
        "sales_org": opt(&order.sales_org, NA),
        "order_status": or(&order.order_status, NA),
        "delivery_reliability": opt(&order.delivery_reliability, NA),
        "credit_status": credit_json(order),
        "customer_info": customer_json(order),
        "delivery_info": delivery_json(order),
        "product_info": product_json(order),
        "status_info": status_json(order),
        "sales_team": sales_team_json(order),
        "additional_info": additional_json(order),
    })
}

fn credit_json(order: &OrderDetail) -> Value {
    let c = &order.credit_status;
    json!({
        "overall_status": or(&c.overall_status, NA),
        "hold_date_start": opt(&c.hold_date_start, NA),
        "last_hold_removed": opt(&c.last_hold_removed, NA),
    })
}

fn customer_json(order: &OrderDetail) -> Value {
    let c = &order.customer_info;
    json!({
        "sold_to": or(&c.sold_to, UNKNOWN),
        "ship_to": or(&c.ship_to, UNKNOWN),
        "ship_to_country": or(&c.ship_to_country, UNKNOWN),
        "ship_to_region": or(&c.ship_to_region, UNKNOWN),
        "ship_to_state": or(&c.ship_to_state, UNKNOWN),
        "sold_to_region_state": or(&c.sold_to_region_state, UNKNOWN),
        "purchase_order": or(&c.purchase_order, NA),
        "po_date": or(&c.po_date, NA),
        "po_type": or(&c.po_type, NA),
    })
}

fn delivery_json(order: &OrderDetail) -> Value {
    let d = &order.delivery_info;
    json!({
        "committed_delivery_date": opt(&d.committed_delivery_date, NA),
        "committed_gi_date": opt(&d.committed_gi_date, NA),
        "requested_delivery_date": opt(&d.requested_delivery_date, NA),
        "requested_gi_date": opt(&d.requested_gi_date, NA),
        "confirmed_delivery_date": opt(&d.confirmed_delivery_date, NA),
        "final_shipment_date": opt(&d.final_shipment_date, NA),
        "planned_delivery_time_days": opt(&d.planned_delivery_time_days, NA),
        "base_uom": opt(&d.base_uom, NA),
        "order_due_date": opt(&d.order_due_date, NA),
        "delivery_number": opt(&d.delivery_number, NA),
        "shipment_number": opt(&d.shipment_number, NA),
    })
}

fn product_json(order: &OrderDetail) -> Value {
    let p = &order.product_info;
    json!({
        "material": opt(&p.material, NA),
        "product_hierarchy": opt(&p.product_hierarchy, NA),
        "division": opt(&p.division, NA),
        "profit_center": opt(&p.profit_center, NA),
        "plant": opt(&p.plant, NA),
        "issuing_plant": opt(&p.issuing_plant, NA),
        "claimed_stock_quantity": opt(&p.claimed_stock_quantity, NA),
    })
}

fn status_json(order: &OrderDetail) -> Value {
    let s = &order.status_info;
    json!({
        "overall_status": or(&s.overall_status, NA),
        "overall_status_text": or(&s.overall_status_text, NA),
        "delivery_status": or(&s.delivery_status, NA),
        "rejection_status": or(&s.rejection_status, NA),
    })
}

fn sales_team_json(order: &OrderDetail) -> Value {
    let t = &order.sales_team;
    json!({
        "sales_employee": or(&t.sales_employee, NA),
        "sales_emp_key": or(&t.sales_emp_key, NA),
        "credit_rep": or(&t.credit_rep, NA),
        "customer_service_representative": or(&t.customer_service_representative, NA),
        "created_by": or(&t.created_by, NA),
        "sales_district": or(&t.sales_district, NA),
        "gid": or(&t.gid, NA),
    })
}

fn additional_json(order: &OrderDetail) -> Value {
    let a = &order.additional_info;
    json!({
        "payment_terms": or(&a.payment_terms, NA),
        "incoterms": or(&a.incoterms, NA),
        "document_currency": or(&a.document_currency, NA),
        "reference_line": or(&a.reference_line, NA),
        "reference_order": or(&a.reference_order, NA),
        "quantity_closed": or(&a.quantity_closed, NA),
        "cumulative_confirmed_qty": or(&a.cumulative_confirmed_qty, NA),
        "sales_order_item_value": or(&a.sales_order_item_value, NA),
        "open_sales_value": or(&a.open_sales_value, NA),
        "total_sales_order_value": or(&a.total_sales_order_value, NA),
        "created_on": or(&a.created_on, NA),
    })
}

/// `$1,234.56`. Negative amounts render as `$-1,234.56`.
pub fn format_usd(value: f64) -> String {
    if !value.is_finite() || value == 0.0 {
        return "$0.00".to_string();
    }
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("${}{}.{}", sign, grouped, frac_part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use salesdesk_core::types::OrderDetail;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 2).unwrap()
    }

    fn rich_context() -> SalesContext {
        let mut ctx = SalesContext::for_email("rep@example.com");
        ctx.summary.total_orders = 1;
        ctx.summary.execution_status = vec!["Open".to_string()];
        ctx.summary.customer_data.sold_to_parties =
            vec!["ACME".to_string(), "Hillshire".to_string()];
        ctx.summary.orders.push(OrderDetail {
            order_number: "31130481".to_string(),
            execution_status: "Open".to_string(),
            value_usd: 1234.5,
            ..OrderDetail::default()
        });
        ctx
    }

    #[test]
    fn test_profile_from_referer() {
        assert_eq!(PromptProfile::from_referer(None), PromptProfile::Protective);
        assert_eq!(
            PromptProfile::from_referer(Some("https://app.example.com/food")),
            PromptProfile::Food
        );
        assert_eq!(
            PromptProfile::from_referer(Some("https://app.example.com/FOOD?x=1")),
            PromptProfile::Food
        );
        assert_eq!(
            PromptProfile::from_referer(Some("https://app.example.com/protective")),
            PromptProfile::Protective
        );
        assert!(!PromptProfile::Food.uses_grounding());
    }

    #[test]
    fn test_base_prompts_carry_placeholder() {
        assert!(PromptProfile::Protective.base_prompt().contains(CONTEXT_PLACEHOLDER));
        assert!(PromptProfile::Food.base_prompt().contains(CONTEXT_PLACEHOLDER));
    }

    #[test]
    fn test_without_sales_data_returns_base_prompt() {
        let builder = PromptBuilder::new(10);
        let ctx = SalesContext::for_email("rep@example.com");
        let prompt = builder.system_prompt_on(PromptProfile::Food, &ctx, date());
        assert_eq!(prompt, PromptProfile::Food.base_prompt());
    }

    #[test]
    fn test_context_is_injected_with_date() {
        let builder = PromptBuilder::new(10);
        let prompt = builder.system_prompt_on(PromptProfile::Protective, &rich_context(), date());

        assert!(!prompt.contains(CONTEXT_PLACEHOLDER));
        assert!(prompt.contains("Sales Overview as of 2024-05-02:"));
        assert!(prompt.contains("Detailed Order Information as of 2024-05-02:"));
        assert!(prompt.contains("\"unique_sold_to\": 2"));
        assert!(prompt.contains("\"order_number\": \"31130481\""));
        assert!(prompt.contains("\"value_usd\": \"$1,234.50\""));
        assert!(prompt.contains("\"sold_to\": \"Unknown\""));
        assert!(prompt.contains("\"payment_terms\": \"N/A\""));
    }

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(0.0), "$0.00");
        assert_eq!(format_usd(5.0), "$5.00");
        assert_eq!(format_usd(999.999), "$1,000.00");
        assert_eq!(format_usd(1234567.891), "$1,234,567.89");
        assert_eq!(format_usd(-42.5), "$-42.50");
    }

    #[test]
    fn test_truncate_keeps_system_and_tail() {
        let builder = PromptBuilder::new(2);
        let messages = vec![
            ModelMessage::system("sys"),
            ModelMessage::user("one"),
            ModelMessage::assistant("two"),
            ModelMessage::user("three"),
        ];
        let truncated = builder.truncate_messages(&messages, PromptProfile::Protective);
        let texts: Vec<&str> = truncated.iter().map(|m| m.text()).collect();
        assert_eq!(texts, vec!["sys", "two", "three"]);
    }

    #[test]
    fn test_truncate_prepends_missing_system() {
        let builder = PromptBuilder::new(10);
        let messages = vec![ModelMessage::user("hi")];
        let truncated = builder.truncate_messages(&messages, PromptProfile::Food);
        assert_eq!(truncated.len(), 2);
        assert_eq!(truncated[0].role, Role::System);
        assert_eq!(truncated[0].text(), PromptProfile::Food.base_prompt());

        assert_eq!(builder.truncate_messages(&[], PromptProfile::Food).len(), 1);
    }
}
