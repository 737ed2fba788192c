//! Roll-up of sales-order rows into a [`SalesSummary`].

use std::collections::BTreeSet;

use serde_json::Value;

use salesdesk_core::types::{
    AdditionalInfo, CreditStatus, CustomerInfo, DeliveryInfo, OrderDetail, ProductInfo,
    SalesSummary, SalesTeam, StatusInfo,
};

use crate::client::Document;

/// Marker the index uses for a line with claimed stock.
const STOCK_CLAIMED: &str = "1.000000";

const NA: &str = "N/A";
const UNKNOWN: &str = "Unknown";

/// Accumulates sales rows one at a time.
///
/// Set-valued fields are kept in `BTreeSet`s so the finished summary lists
/// them sorted.
#[derive(Debug, Default)]
pub struct SalesAggregator {
    total_orders: u64,
    blocked_orders: u64,
    total_order_quantity: f64,
    total_open_quantity: f64,
    execution_status: BTreeSet<String>,
    claimed: u64,
    not_claimed: u64,
    document_types: BTreeSet<String>,
    total_value_usd: f64,
    total_value_dc: f64,
    reliability_scores: BTreeSet<String>,
    companies: BTreeSet<String>,
    sales_orgs: BTreeSet<String>,
    plants: BTreeSet<String>,
    divisions: BTreeSet<String>,
    sold_to: BTreeSet<String>,
    ship_to: BTreeSet<String>,
    countries: BTreeSet<String>,
    regions: BTreeSet<String>,
    orders: Vec<OrderDetail>,
}

impl SalesAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_orders(&self) -> u64 {
        self.total_orders
    }

    pub fn accumulate(&mut self, row: &Document) {
        self.total_orders += 1;

        insert_present(&mut self.execution_status, row, "Sales_Order_Line_Execution_Status");

        if field_str(row, "Blocked_Header").as_deref() == Some("Y") {
            self.blocked_orders += 1;
        }

        if let Some(qty) = field_f64(row, "Order_Quantity") {
            self.total_order_quantity += qty;
        }
        if let Some(qty) = field_f64(row, "Open_Quantity") {
            self.total_open_quantity += qty;
        }

        if field_str(row, "Stock_Availability_Claimed").as_deref() == Some(STOCK_CLAIMED) {
            self.claimed += 1;
        } else {
            self.not_claimed += 1;
        }

        insert_present(&mut self.companies, row, "Company_Code");
        insert_present(&mut self.sales_orgs, row, "Sales_Organization");
        insert_present(&mut self.plants, row, "Plant");
        insert_present(&mut self.divisions, row, "Division");

        insert_present(&mut self.sold_to, row, "Customer");
        insert_present(&mut self.ship_to, row, "Ship_to_Customer");
        insert_present(&mut self.countries, row, "Ship_to_Country");
        insert_present(&mut self.regions, row, "Ship_to_Region");

        insert_present(&mut self.document_types, row, "Sales_Document_Type");
        if let Some(value) = field_f64(row, "Sales_Value_in_USD") {
            self.total_value_usd += value;
        }
        if let Some(value) = field_f64(row, "Sales_Value_Document_Currency") {
            self.total_value_dc += value;
        }

        insert_present(&mut self.reliability_scores, row, "Delivery_Reliability");

        self.orders.push(project_order(row));
    }

    pub fn finish(self) -> SalesSummary {
        let mut summary = SalesSummary {
            total_orders: self.total_orders,
            blocked_orders: self.blocked_orders,
            total_order_quantity: self.total_order_quantity,
            total_open_quantity: self.total_open_quantity,
            execution_status: self.execution_status.into_iter().collect(),
            orders: self.orders,
            ..SalesSummary::default()
        };
        summary.stock_availability.claimed = self.claimed;
        summary.stock_availability.not_claimed = self.not_claimed;
        summary.sales_documents.types = self.document_types.into_iter().collect();
        summary.sales_documents.total_value_usd = self.total_value_usd;
        summary.sales_documents.total_value_dc = self.total_value_dc;
        summary.delivery_metrics.reliability_scores = self.reliability_scores.into_iter().collect();
        summary.territories.companies = self.companies.into_iter().collect();
        summary.territories.sales_orgs = self.sales_orgs.into_iter().collect();
        summary.territories.plants = self.plants.into_iter().collect();
        summary.territories.divisions = self.divisions.into_iter().collect();
        summary.customer_data.sold_to_parties = self.sold_to.into_iter().collect();
        summary.customer_data.ship_to_parties = self.ship_to.into_iter().collect();
        summary.customer_data.countries = self.countries.into_iter().collect();
        summary.customer_data.regions = self.regions.into_iter().collect();
        summary
    }
}

/// Project one row into an [`OrderDetail`].
pub fn project_order(row: &Document) -> OrderDetail {
    let or = |key: &str, default: &str| field_str(row, key).unwrap_or_else(|| default.to_string());
    let opt = |key: &str| field_str(row, key);

    OrderDetail {
        order_number: or("Sales_Order_Number", NA),
        execution_status: or("Sales_Order_Line_Execution_Status", UNKNOWN),
        customer_classification: or("Customer_Classification", UNKNOWN),
        blocked_header: or("Blocked_Header", NA),
        order_quantity: opt("Order_Quantity"),
        open_quantity: opt("Open_Quantity"),
        stock_claimed: opt("Stock_Availability_Claimed"),
        delivery_number: or("Delivery_Number", NA),
        delivery_created_on: opt("Delivery_Created_on"),
        sales_doc_type: opt("Sales_Document_Type"),
        company_code: opt("Company_Code"),
        sales_org: opt("Sales_Organization"),
        order_status: or("Sales_Order_Schedule_line_status", NA),
        value_usd: field_f64(row, "Sales_Value_in_USD").unwrap_or(0.0),
        value_dc: opt("Sales_Value_Document_Currency"),
        delivery_reliability: opt("Delivery_Reliability"),
        credit_status: CreditStatus {
            overall_status: or("Credit_Status", ""),
            hold_date_start: opt("Credit_hold_date_Start"),
            last_hold_removed: opt("Credit_Hold_Date_removal"),
        },
        customer_info: CustomerInfo {
            sold_to: or("Customer", UNKNOWN),
            ship_to: or("Ship_to_Customer", UNKNOWN),
            ship_to_country: or("Ship_to_Country", UNKNOWN),
            ship_to_region: or("Ship_to_Region", UNKNOWN),
            ship_to_state: or("Ship_to_Country_State", UNKNOWN),
            sold_to_region_state: or("Sold_to_Region_State", UNKNOWN),
            purchase_order: or("Customer_PO", NA),
            po_date: or("Customer_Purchase_Order_Date", NA),
            po_type: or("Customer_Purchase_Order_Type_Itm_VBKD_BSARK", NA),
        },
        delivery_info: DeliveryInfo {
            committed_delivery_date: opt("Committed_Delivery_Date"),
            committed_gi_date: opt("Committed_Goods_Issue_Date"),
            requested_delivery_date: opt("Requested_Delivery_Date"),
            requested_gi_date: opt("Requested_Goods_Issue_Date"),
            confirmed_delivery_date: opt("Confirmed_Delivery_Date"),
            final_shipment_date: opt("Final_Shipment_Date"),
            planned_delivery_time_days: opt("Planned_Delivery_Time_in_Days"),
            base_uom: opt("Base_Unit_of_Measure"),
            order_due_date: opt("Order_Due_Date"),
            delivery_number: opt("Delivery_Number"),
            shipment_number: opt("Shipment_Number"),
        },
        product_info: ProductInfo {
            material: opt("Material"),
            product_hierarchy: opt("Product_Hierarchy"),
            division: opt("Division"),
            profit_center: opt("Profit_Center"),
            plant: opt("Plant"),
            issuing_plant: opt("Issuing_Plant"),
            claimed_stock_quantity: opt("Claimed_Stock_Quantity"),
        },
        status_info: StatusInfo {
            overall_status: or("Overall_Processing_Status", NA),
            overall_status_text: or("Overall_Processing_Status_Text_Hdr_VBUK_GBSTK", NA),
            delivery_status: or("Delivery_Status", NA),
            rejection_status: or("Rejection_Status", NA),
        },
        sales_team: SalesTeam {
            sales_employee: or("Sales_Employee", NA),
            sales_emp_key: or("Sales_Emp_Key", NA),
            credit_rep: or("Credit_Representative", NA),
            customer_service_representative: or("Customer_Service_Representative", NA),
            created_by: or("Created_By", NA),
            sales_district: or("Sales_District", NA),
            gid: or("GID", NA),
        },
        additional_info: AdditionalInfo {
            payment_terms: or("Payment_Terms", NA),
            incoterms: or("Incoterms", NA),
            document_currency: or("Document_Currency", NA),
            reference_line: or("Reference_Line", NA),
            reference_order: or("Reference_Order", NA),
            quantity_closed: or("Quantity_Closed", NA),
            cumulative_confirmed_qty: or("Cummulative_Confirmed_Quantity", NA),
            sales_order_item_value: or("Sales_Order_Item_Value", NA),
            open_sales_value: or("Open_Sales_Value", NA),
            total_sales_order_value: or("Total_Sales_Order_Value", NA),
            created_on: or("Created_On", NA),
        },
    }
}

/// String form of a field. Numbers and booleans are stringified; null and
/// missing fields are `None`.
pub fn field_str(row: &Document, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numeric form of a field. Unparsable text reads as `None`.
pub fn field_f64(row: &Document, key: &str) -> Option<f64> {
    match row.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn insert_present(set: &mut BTreeSet<String>, row: &Document, key: &str) {
    if let Some(value) = field_str(row, key).filter(|v| !v.is_empty()) {
        set.insert(value);
    }
}
