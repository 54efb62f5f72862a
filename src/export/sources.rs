//! Sheet definitions over the business tables
//!
//! Each sheet is a SELECT over the POS tables plus a column kind per output
//! column. Sheets whose tables are missing come out with headers only.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, Row};
use tracing::{debug, warn};

use crate::error::{GastroError, GastroResult};
use crate::models::Money;
use crate::storage::database::table_exists;

use super::workbook::{Cell, Sheet};

type Labels = &'static [(&'static str, &'static str)];

const ORDER_TYPES: Labels = &[
    ("local", "Dine-in"),
    ("takeaway", "Takeaway"),
    ("delivery", "Delivery"),
];

const SALE_STATUSES: Labels = &[
    ("pending", "Pending"),
    ("preparing", "Preparing"),
    ("ready", "Ready"),
    ("delivered", "Delivered"),
    ("cancelled", "Cancelled"),
];

const VARIANT_TYPES: Labels = &[
    ("size", "Size"),
    ("flavor", "Flavor"),
    ("topping", "Extra/Topping"),
    ("preparation", "Preparation"),
    ("custom", "Custom"),
];

const UNITS: Labels = &[
    ("kg", "Kilograms"),
    ("g", "Grams"),
    ("l", "Liters"),
    ("ml", "Milliliters"),
    ("u", "Units"),
    ("doc", "Dozens"),
    ("paq", "Packs"),
];

const STOCK_MOVEMENTS: Labels = &[
    ("purchase", "Purchase"),
    ("usage", "Usage"),
    ("adjustment", "Adjustment"),
    ("waste", "Waste"),
    ("return", "Return"),
];

const REGISTER_STATUSES: Labels = &[("open", "Open"), ("closed", "Closed")];

const CASH_MOVEMENTS: Labels = &[
    ("in", "Cash in"),
    ("out", "Cash out"),
    ("sale", "Sale"),
    ("expense", "Expense"),
    ("withdrawal", "Withdrawal"),
    ("deposit", "Deposit"),
    ("adjustment", "Adjustment"),
    ("tip", "Tip"),
];

const POSITIONS: Labels = &[
    ("manager", "Manager"),
    ("cashier", "Cashier"),
    ("cook", "Cook"),
    ("pizza_maker", "Pizza maker"),
    ("delivery", "Delivery"),
    ("waiter", "Waiter"),
    ("cleaner", "Cleaning"),
    ("barista", "Barista"),
    ("helper", "Helper"),
    ("other", "Other"),
];

/// How a selected column becomes a [`Cell`]
#[derive(Debug, Clone, Copy)]
pub(crate) enum Column {
    Text,
    Integer,
    Decimal,
    Money,
    Date,
    DateTime,
    Flag,
    /// Stored code mapped to a display label; unknown codes pass through
    Label(Labels),
    /// JSON list of variant ids rendered as variant names
    Variants,
}

/// Column a `--days` window filters on
#[derive(Debug, Clone, Copy)]
pub(crate) enum Since {
    DateTime(&'static str),
    Date(&'static str),
}

/// Definition of one exported sheet
#[derive(Debug, Clone)]
pub(crate) struct SheetSource {
    pub name: &'static str,
    pub tables: &'static [&'static str],
    pub columns: Vec<(&'static str, Column)>,
    pub select: String,
    pub since: Option<Since>,
    pub order_by: &'static str,
}

/// Display name of a user joined as `alias`: full name, else username
fn user_name(alias: &str) -> String {
    format!(
        "COALESCE(NULLIF(TRIM(COALESCE({a}.first_name, '') || ' ' || COALESCE({a}.last_name, '')), ''), {a}.username)",
        a = alias
    )
}

/// Every sheet, in workbook order
pub(crate) fn sheet_sources() -> Vec<SheetSource> {
    vec![
        SheetSource {
            name: "Sales",
            tables: &["sales_sale", "sales_paymentmethod", "accounts_user"],
            columns: vec![
                ("Number", Column::Text),
                ("Date", Column::DateTime),
                ("Customer", Column::Text),
                ("Type", Column::Label(ORDER_TYPES)),
                ("Status", Column::Label(SALE_STATUSES)),
                ("Subtotal", Column::Money),
                ("Tax", Column::Money),
                ("Discount", Column::Money),
                ("Delivery Fee", Column::Money),
                ("Total", Column::Money),
                ("Payment Method", Column::Text),
                ("Reference", Column::Text),
                ("Paid", Column::Flag),
                ("Seller", Column::Text),
            ],
            select: format!(
                "SELECT s.sale_number, s.created_at, s.customer_name, s.order_type, s.status,
                        s.subtotal, s.tax_amount, s.discount_amount, s.delivery_fee, s.total_amount,
                        pm.name, s.payment_reference, s.is_paid, {}
                 FROM sales_sale s
                 LEFT JOIN sales_paymentmethod pm ON pm.id = s.payment_method_id
                 LEFT JOIN accounts_user u ON u.id = s.created_by_id",
                user_name("u")
            ),
            since: Some(Since::DateTime("s.created_at")),
            order_by: "s.created_at DESC, s.id DESC",
        },
        SheetSource {
            name: "Sale Items",
            tables: &["sales_saleitem", "sales_sale", "products_product"],
            columns: vec![
                ("Sale Number", Column::Text),
                ("Date", Column::DateTime),
                ("Product", Column::Text),
                ("Variants", Column::Variants),
                ("Quantity", Column::Integer),
                ("Unit Price", Column::Money),
                ("Line Total", Column::Money),
                ("Notes", Column::Text),
            ],
            select: "SELECT s.sale_number, s.created_at, p.name, i.selected_variants, i.quantity,
                            i.unit_price, i.unit_price * i.quantity, i.notes
                     FROM sales_saleitem i
                     JOIN sales_sale s ON s.id = i.sale_id
                     LEFT JOIN products_product p ON p.id = i.product_id"
                .to_string(),
            since: Some(Since::DateTime("s.created_at")),
            order_by: "s.created_at DESC, i.id",
        },
        SheetSource {
            name: "Products",
            tables: &["products_product", "products_category"],
            columns: vec![
                ("Name", Column::Text),
                ("Category", Column::Text),
                ("Price", Column::Money),
                ("Has Variants", Column::Flag),
                ("Requires Preparation", Column::Flag),
                ("Active", Column::Flag),
                ("Featured", Column::Flag),
            ],
            select: "SELECT p.name, c.name, p.base_price, p.has_variants, p.requires_preparation,
                            p.is_active, p.is_featured
                     FROM products_product p
                     LEFT JOIN products_category c ON c.id = p.category_id"
                .to_string(),
            since: None,
            order_by: "c.sort_order, p.name",
        },
        SheetSource {
            name: "Variants",
            tables: &["products_productvariant", "products_product"],
            columns: vec![
                ("Product", Column::Text),
                ("Type", Column::Label(VARIANT_TYPES)),
                ("Name", Column::Text),
                ("Price Modifier", Column::Money),
                ("Default", Column::Flag),
                ("Active", Column::Flag),
            ],
            select: "SELECT p.name, v.variant_type, v.name, v.price_modifier, v.is_default, v.is_active
                     FROM products_productvariant v
                     JOIN products_product p ON p.id = v.product_id"
                .to_string(),
            since: None,
            order_by: "p.name, v.variant_type, v.sort_order",
        },
        SheetSource {
            name: "Inventory",
            tables: &["inventory_ingredient", "inventory_supplier"],
            columns: vec![
                ("Ingredient", Column::Text),
                ("Unit", Column::Label(UNITS)),
                ("Current Stock", Column::Decimal),
                ("Minimum Stock", Column::Decimal),
                ("Unit Cost", Column::Money),
                ("Stock Value", Column::Money),
                ("Supplier", Column::Text),
                ("Status", Column::Text),
            ],
            select: "SELECT i.name, i.unit, i.current_stock, i.min_stock, i.cost_per_unit,
                            i.current_stock * i.cost_per_unit, sp.name,
                            CASE WHEN i.current_stock <= i.min_stock THEN 'LOW' ELSE 'OK' END
                     FROM inventory_ingredient i
                     LEFT JOIN inventory_supplier sp ON sp.id = i.supplier_id"
                .to_string(),
            since: None,
            order_by: "i.name",
        },
        SheetSource {
            name: "Stock Movements",
            tables: &["inventory_stockmovement", "inventory_ingredient", "accounts_user"],
            columns: vec![
                ("Date", Column::DateTime),
                ("Ingredient", Column::Text),
                ("Type", Column::Label(STOCK_MOVEMENTS)),
                ("Quantity", Column::Decimal),
                ("Unit Cost", Column::Money),
                ("Total Cost", Column::Money),
                ("Notes", Column::Text),
                ("User", Column::Text),
            ],
            select: format!(
                "SELECT m.created_at, i.name, m.movement_type, m.quantity,
                        COALESCE(m.unit_cost, 0), COALESCE(m.total_cost, 0), m.notes, {}
                 FROM inventory_stockmovement m
                 LEFT JOIN inventory_ingredient i ON i.id = m.ingredient_id
                 LEFT JOIN accounts_user u ON u.id = m.created_by_id",
                user_name("u")
            ),
            since: Some(Since::DateTime("m.created_at")),
            order_by: "m.created_at DESC, m.id DESC",
        },
        SheetSource {
            name: "Expenses",
            tables: &["accounting_expense", "accounting_expensecategory", "accounts_user"],
            columns: vec![
                ("Date", Column::Date),
                ("Category", Column::Text),
                ("Description", Column::Text),
                ("Amount", Column::Money),
                ("Paid By", Column::Text),
                ("Receipt Number", Column::Text),
                ("Notes", Column::Text),
            ],
            select: format!(
                "SELECT e.date, c.name, e.description, e.amount, {}, e.receipt_number, e.notes
                 FROM accounting_expense e
                 LEFT JOIN accounting_expensecategory c ON c.id = e.category_id
                 LEFT JOIN accounts_user u ON u.id = e.paid_by_id",
                user_name("u")
            ),
            since: Some(Since::Date("e.date")),
            order_by: "e.date DESC, e.id DESC",
        },
        SheetSource {
            name: "Cash Registers",
            tables: &["accounting_cashregister", "accounts_user"],
            columns: vec![
                ("Date", Column::Date),
                ("Opening", Column::Money),
                ("Closing", Column::Money),
                ("Expected", Column::Money),
                ("Difference", Column::Money),
                ("Status", Column::Label(REGISTER_STATUSES)),
                ("Opened By", Column::Text),
                ("Closed By", Column::Text),
                ("Notes", Column::Text),
            ],
            select: format!(
                "SELECT r.date, r.opening_amount, r.closing_amount, r.expected_amount, r.difference,
                        r.status, {}, {}, r.notes
                 FROM accounting_cashregister r
                 LEFT JOIN accounts_user ou ON ou.id = r.opened_by_id
                 LEFT JOIN accounts_user cu ON cu.id = r.closed_by_id",
                user_name("ou"),
                user_name("cu")
            ),
            since: Some(Since::Date("r.date")),
            order_by: "r.date DESC, r.id DESC",
        },
        SheetSource {
            name: "Cash Movements",
            tables: &["accounting_cashmovement", "accounts_user"],
            columns: vec![
                ("Date", Column::DateTime),
                ("Type", Column::Label(CASH_MOVEMENTS)),
                ("Amount", Column::Money),
                ("Description", Column::Text),
                ("Notes", Column::Text),
                ("User", Column::Text),
            ],
            select: format!(
                "SELECT m.created_at, m.movement_type, m.amount, m.description, m.notes, {}
                 FROM accounting_cashmovement m
                 LEFT JOIN accounts_user u ON u.id = m.created_by_id",
                user_name("u")
            ),
            since: Some(Since::DateTime("m.created_at")),
            order_by: "m.created_at DESC, m.id DESC",
        },
        SheetSource {
            name: "Employees",
            tables: &["employees_employee"],
            columns: vec![
                ("First Name", Column::Text),
                ("Last Name", Column::Text),
                ("Position", Column::Label(POSITIONS)),
                ("Phone", Column::Text),
                ("Email", Column::Text),
                ("DNI", Column::Text),
                ("Monthly Salary", Column::Money),
                ("Hired", Column::Date),
                ("Active", Column::Flag),
            ],
            select: "SELECT e.first_name, e.last_name, e.position, e.phone, e.email, e.dni,
                            COALESCE(e.base_salary, 0), e.hire_date, e.is_active
                     FROM employees_employee e"
                .to_string(),
            since: None,
            order_by: "e.last_name, e.first_name",
        },
    ]
}

/// Lookup tables shared by every sheet
#[derive(Debug, Default)]
pub(crate) struct Lookups {
    variant_names: HashMap<i64, String>,
}

impl Lookups {
    pub fn load(conn: &Connection) -> GastroResult<Self> {
        let mut variant_names = HashMap::new();
        if table_exists(conn, "products_productvariant")? {
            let mut stmt = conn.prepare("SELECT id, name FROM products_productvariant")?;
            let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
            for row in rows {
                let (id, name) = row?;
                variant_names.insert(id, name);
            }
        }
        Ok(Self { variant_names })
    }

    fn variant_label(&self, ids: &[i64]) -> String {
        ids.iter()
            .map(|id| {
                self.variant_names
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| format!("#{}", id))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl SheetSource {
    fn headers(&self) -> Vec<&'static str> {
        self.columns.iter().map(|(header, _)| *header).collect()
    }

    fn sql(&self, filtered: bool) -> String {
        match (self.since, filtered) {
            (Some(Since::DateTime(col)), true) | (Some(Since::Date(col)), true) => {
                format!("{} WHERE {} >= ?1 ORDER BY {}", self.select, col, self.order_by)
            }
            _ => format!("{} ORDER BY {}", self.select, self.order_by),
        }
    }

    /// Bound for the `since` column, in the format the POS stores
    fn since_param(&self, since: DateTime<Utc>) -> Option<String> {
        match self.since? {
            Since::DateTime(_) => Some(since.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string()),
            Since::Date(_) => Some(since.date_naive().format("%Y-%m-%d").to_string()),
        }
    }

    /// Run the query and build the sheet
    pub fn materialize(
        &self,
        conn: &Connection,
        lookups: &Lookups,
        since: Option<DateTime<Utc>>,
    ) -> GastroResult<Sheet> {
        let mut sheet = Sheet::new(self.name, &self.headers());

        for table in self.tables {
            if !table_exists(conn, table)? {
                warn!(sheet = self.name, table, "table missing, exporting headers only");
                return Ok(sheet);
            }
        }

        let bound = since.and_then(|s| self.since_param(s));
        let sql = self.sql(bound.is_some());
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| GastroError::Export(format!("Sheet {}: {}", self.name, e)))?;

        let mut rows = match &bound {
            Some(value) => stmt.query([value])?,
            None => stmt.query([])?,
        };
        while let Some(row) = rows.next()? {
            sheet.push_row(self.read_row(row, lookups)?);
        }

        debug!(sheet = self.name, rows = sheet.len(), "sheet materialized");
        Ok(sheet)
    }

    fn read_row(&self, row: &Row<'_>, lookups: &Lookups) -> GastroResult<Vec<Cell>> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, (_, kind))| Ok(to_cell(row.get_ref(idx)?, *kind, lookups)))
            .collect()
    }
}

fn to_cell(value: ValueRef<'_>, kind: Column, lookups: &Lookups) -> Cell {
    if let ValueRef::Null = value {
        return Cell::Empty;
    }
    match kind {
        Column::Text => Cell::text(as_text(value)),
        Column::Integer => match value {
            ValueRef::Integer(n) => Cell::Integer(n),
            ValueRef::Real(v) => Cell::Integer(v.round() as i64),
            other => text_or(other, |s| s.trim().parse().ok().map(Cell::Integer)),
        },
        Column::Decimal => match as_number(value) {
            Some(v) => Cell::Decimal(v),
            None => Cell::text(as_text(value)),
        },
        Column::Money => match value {
            ValueRef::Integer(n) => Cell::Money(Money::from_cents(n * 100)),
            ValueRef::Real(v) => Cell::Money(Money::from_amount(v)),
            other => text_or(other, |s| Money::parse(s).map(Cell::Money)),
        },
        Column::Date => text_or(value, |s| parse_date(s).map(Cell::Date)),
        Column::DateTime => text_or(value, |s| parse_datetime(s).map(Cell::DateTime)),
        Column::Flag => match value {
            ValueRef::Integer(n) => Cell::Flag(n != 0),
            ValueRef::Real(v) => Cell::Flag(v != 0.0),
            other => text_or(other, |s| match s.trim() {
                "1" | "true" | "True" => Some(Cell::Flag(true)),
                "0" | "false" | "False" => Some(Cell::Flag(false)),
                _ => None,
            }),
        },
        Column::Label(labels) => {
            let code = as_text(value);
            let label = labels
                .iter()
                .find(|(key, _)| *key == code)
                .map(|(_, label)| label.to_string())
                .unwrap_or(code);
            Cell::text(label)
        }
        Column::Variants => Cell::text(lookups.variant_label(&decode_variant_ids(&as_text(value)))),
    }
}

/// Parse text with `parse`, falling back to the raw text
fn text_or(value: ValueRef<'_>, parse: impl FnOnce(&str) -> Option<Cell>) -> Cell {
    let raw = as_text(value);
    parse(&raw).unwrap_or_else(|| Cell::text(raw))
}

fn as_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(n) => n.to_string(),
        ValueRef::Real(v) => v.to_string(),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn as_number(value: ValueRef<'_>) -> Option<f64> {
    match value {
        ValueRef::Integer(n) => Some(n as f64),
        ValueRef::Real(v) => Some(v),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok()
}

/// Accepts `YYYY-MM-DD HH:MM:SS[.ffffff]`, the ISO `T` form, and RFC 3339
fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Variant ids from a `selected_variants` JSON list
///
/// Accepts numbers and numeric strings; anything else is skipped.
pub fn decode_variant_ids(raw: &str) -> Vec<i64> {
    let values: Vec<serde_json::Value> = match serde_json::from_str(raw) {
        Ok(values) => values,
        Err(_) => return Vec::new(),
    };
    values
        .iter()
        .filter_map(|v| match v {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .collect()
}
