//! Index query client.
//!
//! [`IndexSearcher`] is the seam the federated search runs against;
//! [`AzureSearchClient`] implements it over the search service's REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use salesdesk_core::config::SearchConfig;

use crate::error::SearchError;

/// A search hit as returned by the index, field name to value.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Fields projected from the sales-order indexes.
pub const SALES_FIELDS: &[&str] = &[
    "Sales_Order_Number",
    "Sales_Order_Line_Execution_Status",
    "Customer_Classification",
    "Blocked_Header",
    "Sales_Order_Schedule_line_status",
    "Order_Quantity",
    "Open_Quantity",
    "Stock_Availability_Claimed",
    "Credit_hold_date_Start",
    "Credit_Hold_Date_removal",
    "Requested_Delivery_Date_1",
    "Customer",
    "Division",
    "Sales_Document_Type",
    "Company_Code",
    "Sales_Organization",
    "Payment_Terms",
    "Delivery_Number",
    "Delivery_Created_on",
    "Created_By",
    "Plant",
    "Final_Shipment_Date",
    "Committed_Delivery_Date",
    "Committed_Goods_Issue_Date",
    "Base_Unit_of_Measure",
    "Requested_Delivery_Date",
    "Requested_Goods_Issue_Date",
    "Document_Currency",
    "Customer_Purchase_Order_Date",
    "Customer_PO",
    "Sales_Employee",
    "Credit_Status",
    "Rejection_Status",
    "Sales_Order_Item_Value",
    "Confirmed_Delivery_Date",
    "Credit_Representative",
    "Planned_Delivery_Time_in_Days",
    "Cummulative_Confirmed_Quantity",
    "Delivery_Reliability",
    "Order_Due_Date",
    "Sales_District",
    "Claimed_Stock_Quantity",
    "Issuing_Plant",
    "Ship_to_Customer",
    "Quantity_Closed",
    "Customer_Service_Representative",
    "Sales_Value_Document_Currency",
    "Shipment_Number",
    "Incoterms",
    "Created_On",
    "Open_Sales_Value",
    "Customer_Purchase_Order_Type_Itm_VBKD_BSARK",
    "Sales_Value_in_USD",
    "Profit_Center",
    "Material",
    "Product_Hierarchy",
    "Overall_Processing_Status",
    "Delivery_Status",
    "Ship_to_Region",
    "Ship_to_Country",
    "Ship_to_Country_State",
    "Sold_to_Region_State",
    "Reference_Line",
    "Reference_Order",
    "Total_Sales_Order_Value",
    "Overall_Processing_Status_Text_Hdr_VBUK_GBSTK",
    "Sales_Emp_Key",
    "GID",
    "Email_ID",
];

/// Queries one index on behalf of one rep.
#[async_trait]
pub trait IndexSearcher: Send + Sync {
    /// Full-text query `query` against `index`, restricted to rows owned by `email`.
    async fn search(
        &self,
        index: &str,
        query: &str,
        email: &str,
    ) -> Result<Vec<Document>, SearchError>;
}

/// REST client for the hosted search service.
#[derive(Clone)]
pub struct AzureSearchClient {
    client: Client,
    endpoint: String,
    api_key: String,
    api_version: String,
}

impl AzureSearchClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        api_version: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::InvalidResponse(format!("failed to build client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_version: api_version.into(),
        })
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self, SearchError> {
        Self::new(
            &config.endpoint,
            &config.api_key,
            &config.api_version,
            Duration::from_secs(config.request_timeout_secs),
        )
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    value: Vec<Document>,
}

#[async_trait]
impl IndexSearcher for AzureSearchClient {
    async fn search(
        &self,
        index: &str,
        query: &str,
        email: &str,
    ) -> Result<Vec<Document>, SearchError> {
        let url = format!("{}/indexes/{}/docs", self.endpoint, index);
        let search = if query.trim().is_empty() { "*" } else { query };
        let filter = email_filter(email);
        let select = SALES_FIELDS.join(",");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("api-version", self.api_version.as_str()),
                ("$search", search),
                ("$filter", filter.as_str()),
                ("$select", select.as_str()),
            ])
            .header("api-key", &self.api_key)
            .header("content-type", "application/json")
            .send()
            .await
            .map_err(|e| SearchError::Transient(format!("request to {} failed: {}", index, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read search error body".to_string());
            return Err(classify_status(status, body));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;
        debug!(index, hits = parsed.value.len(), "Index query returned");
        Ok(parsed.value)
    }
}

/// OData filter restricting rows to one rep. Single quotes are doubled.
pub fn email_filter(email: &str) -> String {
    format!("Email_ID eq '{}'", email.replace('\'', "''"))
}

fn classify_status(status: StatusCode, body: String) -> SearchError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        SearchError::Transient(format!("HTTP {}: {}", status.as_u16(), body))
    } else {
        SearchError::Rejected {
            status: status.as_u16(),
            message: body,
        }
    }
}
