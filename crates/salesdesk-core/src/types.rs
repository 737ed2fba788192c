//! Shared domain types for the Salesdesk workspace.
//!
//! Chat sessions, model and display messages, citations, user identity, and
//! the sales-territory context assembled from federated search results.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title shown for a conversation that has no focus area yet.
pub const NEW_CONVERSATION: &str = "New Conversation";

/// Placeholder for contact fields we have no data for.
pub const NOT_AVAILABLE: &str = "Not Available";

// =============================================================================
// Identity
// =============================================================================

/// Authenticated caller as described by the upstream identity headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: String,
    pub email: String,
    /// Group memberships (deduplicated, insertion order).
    #[serde(default)]
    pub groups: Vec<String>,
    /// Delegated access token for the mail provider, if the caller has one.
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
}

impl UserIdentity {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            groups: Vec::new(),
            access_token: None,
        }
    }

    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Speaker of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// One part of a multi-part model message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

/// Model message content: plain text, or text plus image parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A message in the raw completion-API conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ModelMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    /// User message carrying an inline image as a data URL.
    pub fn user_with_image(text: impl Into<String>, data_url: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: data_url.into(),
                    },
                },
            ]),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    /// The textual content (first text part for multi-part messages).
    pub fn text(&self) -> &str {
        match &self.content {
            MessageContent::Text(text) => text,
            MessageContent::Parts(parts) => parts
                .iter()
                .find_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .unwrap_or(""),
        }
    }
}

/// A grounding reference returned alongside an assistant reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub filepath: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub chunk_id: Option<String>,
}

/// Per-turn annotations kept with assistant display messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnMetadata {
    #[serde(default)]
    pub key_takeaways: Vec<String>,
    #[serde(default)]
    pub actions: Option<String>,
}

/// A message as shown to the user in the chat history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TurnMetadata>,
}

impl DisplayMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            citations: Vec::new(),
            metadata: None,
        }
    }

    pub fn assistant(
        content: impl Into<String>,
        citations: Vec<Citation>,
        metadata: TurnMetadata,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            citations,
            metadata: Some(metadata),
        }
    }
}

// =============================================================================
// Chat session
// =============================================================================

/// A persisted conversation owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub user_id: String,
    /// Raw completion conversation; the first entry is the system prompt.
    pub messages: Vec<ModelMessage>,
    /// What the user sees, including citations and turn metadata.
    pub chat_history: Vec<DisplayMessage>,
    /// Citations of the most recent assistant reply.
    pub citations: Vec<Citation>,
    pub product_category: String,
    pub confidence_level: i64,
    pub focus_area: String,
    pub detected_language: String,
    pub sales_metadata: SalesContext,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl ChatSession {
    /// Start a fresh conversation seeded with the given system prompt.
    pub fn new(
        user_id: impl Into<String>,
        system_prompt: impl Into<String>,
        sales_metadata: SalesContext,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            messages: vec![ModelMessage::system(system_prompt)],
            chat_history: Vec::new(),
            citations: Vec::new(),
            product_category: String::new(),
            confidence_level: 0,
            focus_area: NEW_CONVERSATION.to_string(),
            detected_language: String::new(),
            sales_metadata,
            created_at: now,
            last_activity: now,
        }
    }

    /// A session is empty until the first message has been exchanged.
    pub fn is_empty(&self) -> bool {
        self.chat_history.is_empty()
    }

    pub fn title(&self) -> &str {
        if self.focus_area.is_empty() {
            NEW_CONVERSATION
        } else {
            &self.focus_area
        }
    }
}

// =============================================================================
// Sales context
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockAvailability {
    pub claimed: u64,
    pub not_claimed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesDocuments {
    pub types: Vec<String>,
    pub total_value_usd: f64,
    pub total_value_dc: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryMetrics {
    pub on_time: u64,
    pub delayed: u64,
    pub reliability_scores: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Territories {
    pub companies: Vec<String>,
    pub sales_orgs: Vec<String>,
    pub plants: Vec<String>,
    pub divisions: Vec<String>,
}

impl Territories {
    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
            && self.sales_orgs.is_empty()
            && self.plants.is_empty()
            && self.divisions.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerData {
    pub sold_to_parties: Vec<String>,
    pub ship_to_parties: Vec<String>,
    pub countries: Vec<String>,
    pub regions: Vec<String>,
}

impl CustomerData {
    pub fn is_empty(&self) -> bool {
        self.sold_to_parties.is_empty()
            && self.ship_to_parties.is_empty()
            && self.countries.is_empty()
            && self.regions.is_empty()
    }
}

/// Aggregate over every sales-order row returned for a rep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesSummary {
    pub total_orders: u64,
    pub blocked_orders: u64,
    pub total_order_quantity: f64,
    pub total_open_quantity: f64,
    pub execution_status: Vec<String>,
    pub stock_availability: StockAvailability,
    pub sales_documents: SalesDocuments,
    pub delivery_metrics: DeliveryMetrics,
    pub territories: Territories,
    pub customer_data: CustomerData,
    pub orders: Vec<OrderDetail>,
}

/// Everything known about the rep's territory, injected into the prompt.
///
/// Key names follow the search index's JSON so snapshots stored with a
/// session stay readable by the chat front end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesContext {
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Phone")]
    pub phone: String,
    #[serde(rename = "SalesRepID", skip_serializing_if = "Option::is_none")]
    pub sales_rep_id: Option<String>,
    #[serde(rename = "Title", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "Territory", skip_serializing_if = "Option::is_none")]
    pub territory: Option<String>,
    #[serde(flatten)]
    pub summary: SalesSummary,
    /// Latest hit per non-sales index, keyed by index name.
    pub index_data: BTreeMap<String, serde_json::Value>,
    /// Up to two lower-ranked non-sales hits.
    pub additional_context: Vec<serde_json::Value>,
}

impl SalesContext {
    /// Default context for a rep we know nothing about yet.
    pub fn for_email(email: &str) -> Self {
        Self {
            email: if email.is_empty() {
                NOT_AVAILABLE.to_string()
            } else {
                email.to_string()
            },
            phone: NOT_AVAILABLE.to_string(),
            ..Self::default()
        }
    }

    /// True only when there are orders and at least one other kind of
    /// usable data (aggregate, monetary, territory or customer).
    pub fn has_sales_rep_data(&self) -> bool {
        let s = &self.summary;
        if s.orders.is_empty() {
            return false;
        }
        let has_aggregate = s.total_orders > 0 && !s.execution_status.is_empty();
        let has_sales =
            s.sales_documents.total_value_usd > 0.0 || s.sales_documents.total_value_dc > 0.0;
        has_aggregate || has_sales || !s.territories.is_empty() || !s.customer_data.is_empty()
    }
}

// =============================================================================
// Order detail
// =============================================================================

/// One sales-order line projected from a search row.
///
/// Text fields the rep always expects to see carry an `N/A`/`Unknown`
/// placeholder; the rest stay `None` when the row has no value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderDetail {
    pub order_number: String,
    pub execution_status: String,
    pub customer_classification: String,
    pub blocked_header: String,
    pub order_quantity: Option<String>,
    pub open_quantity: Option<String>,
    pub stock_claimed: Option<String>,
    pub delivery_number: String,
    pub delivery_created_on: Option<String>,
    pub sales_doc_type: Option<String>,
    pub company_code: Option<String>,
    pub sales_org: Option<String>,
    pub order_status: String,
    pub value_usd: f64,
    pub value_dc: Option<String>,
    pub delivery_reliability: Option<String>,
    pub credit_status: CreditStatus,
    pub customer_info: CustomerInfo,
    pub delivery_info: DeliveryInfo,
    pub product_info: ProductInfo,
    pub status_info: StatusInfo,
    pub sales_team: SalesTeam,
    pub additional_info: AdditionalInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreditStatus {
    pub overall_status: String,
    pub hold_date_start: Option<String>,
    pub last_hold_removed: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerInfo {
    pub sold_to: String,
    pub ship_to: String,
    pub ship_to_country: String,
    pub ship_to_region: String,
    pub ship_to_state: String,
    pub sold_to_region_state: String,
    pub purchase_order: String,
    pub po_date: String,
    pub po_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryInfo {
    pub committed_delivery_date: Option<String>,
    pub committed_gi_date: Option<String>,
    pub requested_delivery_date: Option<String>,
    pub requested_gi_date: Option<String>,
    pub confirmed_delivery_date: Option<String>,
    pub final_shipment_date: Option<String>,
    pub planned_delivery_time_days: Option<String>,
    pub base_uom: Option<String>,
    pub order_due_date: Option<String>,
    pub delivery_number: Option<String>,
    pub shipment_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductInfo {
    pub material: Option<String>,
    pub product_hierarchy: Option<String>,
    pub division: Option<String>,
    pub profit_center: Option<String>,
    pub plant: Option<String>,
    pub issuing_plant: Option<String>,
    pub claimed_stock_quantity: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusInfo {
    pub overall_status: String,
    pub overall_status_text: String,
    pub delivery_status: String,
    pub rejection_status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesTeam {
    pub sales_employee: String,
    pub sales_emp_key: String,
    pub credit_rep: String,
    pub customer_service_representative: String,
    pub created_by: String,
    pub sales_district: String,
    pub gid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdditionalInfo {
    pub payment_terms: String,
    pub incoterms: String,
    pub document_currency: String,
    pub reference_line: String,
    pub reference_order: String,
    pub quantity_closed: String,
    pub cumulative_confirmed_qty: String,
    pub sales_order_item_value: String,
    pub open_sales_value: String,
    pub total_sales_order_value: String,
    pub created_on: String,
}
