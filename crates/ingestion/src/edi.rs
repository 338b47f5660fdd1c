//! EDI X12 parsing and the EDI adapter (spec.md §4.C), grounded on
//! `examples/original_source/backend/integrations/edi_adapter.py`.
//!
//! Supported document types: 846 (inventory), 856 (ASN), 810 (invoice),
//! inbound; 850 (purchase order) generated outbound.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::adapter::IngestionAdapter;
use crate::error::{IngestionError, Result};
use crate::model::{AdapterKind, EdiDirection, EdiTransactionLog, EdiTransactionStatus, SyncResult, SyncStatus};

pub const SEGMENT_TERMINATOR: char = '~';
pub const ELEMENT_SEPARATOR: char = '*';

fn owned_segments(raw: &str) -> Vec<String> {
    raw.replace(['\r', '\n'], "")
        .split(SEGMENT_TERMINATOR)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Scans adjacent element tokens for qualifier/value pairs, tolerating the
/// sequence-number-prefixed variant real trading partners send
/// (e.g. `LIN*1*UP*...*IN*...`).
fn extract_id_value_pairs(elements: &[&str]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    if elements.len() < 2 {
        return pairs;
    }
    for idx in 1..elements.len() - 1 {
        let qualifier = elements[idx].trim();
        let value = elements[idx + 1].trim();
        if !qualifier.is_empty() && !value.is_empty() {
            pairs.push((qualifier.to_string(), value.to_string()));
        }
    }
    pairs
}

fn parse_yyyymmdd(s: &str) -> Option<NaiveDate> {
    if s.len() == 8 {
        NaiveDate::parse_from_str(s, "%Y%m%d").ok()
    } else {
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct Edi846Item {
    pub gtin: String,
    pub upc: String,
    pub quantity_on_hand: i64,
    pub quantity_on_order: i64,
    pub warehouse_id: String,
    pub unit_of_measure: String,
    pub as_of_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct Edi856Item {
    pub gtin: String,
    pub quantity: i64,
    pub po_number: String,
}

#[derive(Debug, Clone, Default)]
pub struct Edi856Shipment {
    pub shipment_id: String,
    pub ship_date: Option<NaiveDate>,
    pub expected_delivery: Option<NaiveDate>,
    pub carrier: String,
    pub tracking_number: String,
    pub items: Vec<Edi856Item>,
}

#[derive(Debug, Clone)]
pub struct Edi810LineItem {
    pub gtin: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub line_total: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Edi810Invoice {
    pub invoice_number: String,
    pub invoice_date: Option<NaiveDate>,
    pub po_number: String,
    pub total_amount: f64,
    pub line_items: Vec<Edi810LineItem>,
}

/// Detects the EDI document type (846/856/810/850) from the `ST` segment.
/// Classification is content-based, never filename-based.
pub fn detect_transaction_type(raw: &str) -> Option<String> {
    for seg in owned_segments(raw) {
        let elements: Vec<&str> = seg.split(ELEMENT_SEPARATOR).collect();
        if elements.first().map(|s| s.trim()) == Some("ST") && elements.len() >= 2 {
            return Some(elements[1].trim().to_string());
        }
    }
    None
}

/// Parses an EDI 846 Inventory Inquiry/Advice document into line items.
pub fn parse_846(raw: &str) -> Vec<Edi846Item> {
    let mut items = Vec::new();
    let mut current = Edi846Item {
        unit_of_measure: "EA".to_string(),
        ..Default::default()
    };
    let mut has_current = false;

    for seg in owned_segments(raw) {
        let elements: Vec<&str> = seg.split(ELEMENT_SEPARATOR).collect();
        let seg_id = elements[0].trim();

        match seg_id {
            "LIN" if elements.len() >= 4 => {
                if !current.gtin.is_empty() {
                    items.push(std::mem::replace(&mut current, Edi846Item::default()));
                }
                current = Edi846Item {
                    unit_of_measure: "EA".to_string(),
                    ..Default::default()
                };
                has_current = true;
                for (qualifier, value) in extract_id_value_pairs(&elements) {
                    match qualifier.as_str() {
                        "UP" => {
                            current.upc = value.clone();
                            if current.gtin.is_empty() {
                                current.gtin = value;
                            }
                        }
                        "IN" => current.gtin = value,
                        _ => {}
                    }
                }
            }
            "QTY" if elements.len() >= 3 => {
                let qualifier = elements[1].trim();
                let qty: i64 = elements[2].trim().parse::<f64>().unwrap_or(0.0) as i64;
                match qualifier {
                    "33" => current.quantity_on_hand = qty,
                    "02" => current.quantity_on_order = qty,
                    _ => {}
                }
                if elements.len() >= 4 {
                    current.unit_of_measure = elements[3].trim().to_string();
                }
            }
            "DTM" if elements.len() >= 3 => {
                if elements[1].trim() == "405" {
                    current.as_of_date = parse_yyyymmdd(elements[2].trim());
                }
            }
            "N1" if elements.len() >= 5 => {
                if elements[1].trim() == "WH" {
                    current.warehouse_id = elements[4].trim().to_string();
                }
            }
            _ => {}
        }
    }

    if has_current && !current.gtin.is_empty() {
        items.push(current);
    }
    items
}

/// Parses an EDI 856 Advance Ship Notice.
pub fn parse_856(raw: &str) -> Edi856Shipment {
    let mut shipment = Edi856Shipment::default();
    let mut current_po = String::new();
    let mut current_gtin = String::new();
    let mut current_qty: i64 = 0;
    let mut has_current = false;

    let flush = |shipment: &mut Edi856Shipment, gtin: &str, qty: i64, po: &str| {
        if !gtin.is_empty() {
            shipment.items.push(Edi856Item {
                gtin: gtin.to_string(),
                quantity: qty,
                po_number: po.to_string(),
            });
        }
    };

    for seg in owned_segments(raw) {
        let elements: Vec<&str> = seg.split(ELEMENT_SEPARATOR).collect();
        let seg_id = elements[0].trim();

        match seg_id {
            "BSN" if elements.len() >= 4 => {
                shipment.shipment_id = elements[2].trim().to_string();
                shipment.ship_date = parse_yyyymmdd(elements[3].trim());
            }
            "TD5" if elements.len() >= 5 => {
                shipment.carrier = elements[3].trim().to_string();
            }
            "REF" if elements.len() >= 3 => {
                let qualifier = elements[1].trim();
                if qualifier == "CN" {
                    shipment.tracking_number = elements[2].trim().to_string();
                } else if qualifier == "PO" {
                    current_po = elements[2].trim().to_string();
                }
            }
            "LIN" if elements.len() >= 4 => {
                if has_current {
                    flush(&mut shipment, &current_gtin, current_qty, &current_po);
                }
                current_gtin.clear();
                current_qty = 0;
                has_current = true;
                for (qualifier, value) in extract_id_value_pairs(&elements) {
                    if qualifier == "UP" || qualifier == "IN" {
                        current_gtin = value;
                    }
                }
            }
            "SN1" if elements.len() >= 4 => {
                current_qty = elements[2].trim().parse::<f64>().unwrap_or(0.0) as i64;
            }
            "DTM" if elements.len() >= 3 => {
                if elements[1].trim() == "017" {
                    shipment.expected_delivery = parse_yyyymmdd(elements[2].trim());
                }
            }
            _ => {}
        }
    }

    if has_current {
        flush(&mut shipment, &current_gtin, current_qty, &current_po);
    }
    shipment
}

/// Parses an EDI 810 Invoice.
pub fn parse_810(raw: &str) -> Edi810Invoice {
    let mut invoice = Edi810Invoice::default();
    let mut current: Option<Edi810LineItem> = None;

    for seg in owned_segments(raw) {
        let elements: Vec<&str> = seg.split(ELEMENT_SEPARATOR).collect();
        let seg_id = elements[0].trim();

        match seg_id {
            "BIG" if elements.len() >= 4 => {
                invoice.invoice_date = parse_yyyymmdd(elements[1].trim());
                invoice.invoice_number = elements[2].trim().to_string();
                if elements.len() >= 5 {
                    invoice.po_number = elements[4].trim().to_string();
                }
            }
            "IT1" if elements.len() >= 7 => {
                if let Some(line) = current.take() {
                    if !line.gtin.is_empty() {
                        invoice.line_items.push(line);
                    }
                }
                let quantity = elements[2].trim().parse::<f64>().unwrap_or(0.0) as i64;
                let unit_price: f64 = elements[4].trim().parse().unwrap_or(0.0);
                let mut line = Edi810LineItem {
                    gtin: String::new(),
                    quantity,
                    unit_price,
                    line_total: quantity as f64 * unit_price,
                };
                for (qualifier, value) in extract_id_value_pairs(&elements) {
                    if qualifier == "UP" || qualifier == "IN" {
                        line.gtin = value;
                    }
                }
                current = Some(line);
            }
            "TDS" if elements.len() >= 2 => {
                let cents: f64 = elements[1].trim().parse().unwrap_or(0.0);
                invoice.total_amount = cents / 100.0;
            }
            _ => {}
        }
    }

    if let Some(line) = current {
        if !line.gtin.is_empty() {
            invoice.line_items.push(line);
        }
    }
    invoice
}

/// Generates an outbound-style EDI 846 Inventory Advice document from a
/// set of items. Used by tests to exercise the `parse_846(generate_846(..))
/// ≈ items` round-trip property (spec.md §8).
pub fn generate_846(items: &[Edi846Item], now: DateTime<Utc>) -> String {
    let date_str = now.format("%Y%m%d").to_string();
    let time_str = now.format("%H%M").to_string();
    let interchange_date = now.format("%y%m%d").to_string();

    let mut segments = vec![
        format!(
            "ISA*00*          *00*          *ZZ*SHELFOPS       *ZZ*TRADINGPTNR    *{}*{}*U*00401*000000001*0*P*>",
            interchange_date, time_str
        ),
        format!("GS*IB*SHELFOPS*TRADINGPTNR*{}*{}*1*X*004010", date_str, time_str),
        "ST*846*0001".to_string(),
    ];

    for item in items {
        segments.push(format!("LIN*1*UP*{}*IN*{}", item.upc, item.gtin));
        segments.push(format!("QTY*33*{}*{}", item.quantity_on_hand, item.unit_of_measure));
        segments.push(format!("QTY*02*{}*{}", item.quantity_on_order, item.unit_of_measure));
        if let Some(date) = item.as_of_date {
            segments.push(format!("DTM*405*{}", date.format("%Y%m%d")));
        }
        if !item.warehouse_id.is_empty() {
            segments.push(format!("N1*WH*Warehouse*92*{}", item.warehouse_id));
        }
    }

    // ST through the line segments, plus SE itself (segments[0..2) are ISA/GS).
    let st_to_se_count = (segments.len() - 2) + 1;
    segments.push(format!("SE*{}*0001", st_to_se_count));
    segments.push("GE*1*1".to_string());
    segments.push("IEA*1*000000001".to_string());

    segments.join(&SEGMENT_TERMINATOR.to_string()) + &SEGMENT_TERMINATOR.to_string()
}

pub struct Edi850Item {
    pub gtin: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub uom: String,
}

pub struct Edi850ShipTo {
    pub name: String,
    pub id: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

/// Generates an outbound EDI 850 Purchase Order from an approved
/// reorder recommendation.
pub fn generate_850(
    po_number: &str,
    vendor_id: &str,
    items: &[Edi850Item],
    ship_to: Option<&Edi850ShipTo>,
    now: DateTime<Utc>,
) -> String {
    let date_str = now.format("%Y%m%d").to_string();
    let time_str = now.format("%H%M").to_string();
    let interchange_date = now.format("%y%m%d").to_string();

    let mut segments = vec![
        format!(
            "ISA*00*          *00*          *ZZ*SHELFOPS       *ZZ*{:<15}*{}*{}*U*00401*000000001*0*P*>",
            vendor_id, interchange_date, time_str
        ),
        format!("GS*PO*SHELFOPS*{}*{}*{}*1*X*004010", vendor_id, date_str, time_str),
        "ST*850*0001".to_string(),
        format!("BEG*00*NE*{}**{}", po_number, date_str),
    ];

    if let Some(ship_to) = ship_to {
        segments.push(format!("N1*ST*{}*92*{}", ship_to.name, ship_to.id));
        segments.push(format!("N3*{}", ship_to.address));
        segments.push(format!("N4*{}*{}*{}", ship_to.city, ship_to.state, ship_to.zip));
    }

    let mut seg_count = segments.len();
    for (i, item) in items.iter().enumerate() {
        segments.push(format!(
            "PO1*{}*{}*{}*{:.2}*PE*IN*{}",
            i + 1,
            item.quantity,
            item.uom,
            item.unit_price,
            item.gtin
        ));
        seg_count += 1;
    }

    seg_count += 4; // ST + SE + GE + IEA
    segments.push(format!("SE*{}*0001", seg_count));
    segments.push("GE*1*1".to_string());
    segments.push("IEA*1*000000001".to_string());

    segments.join(&SEGMENT_TERMINATOR.to_string()) + &SEGMENT_TERMINATOR.to_string()
}

/// EDI X12 file-drop adapter: polls an inbound directory, classifies each
/// file by its `ST` segment (not filename), parses, and archives on
/// success. Partial failures leave the file in place with an error logged.
pub struct EdiAdapter {
    pub input_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub partner_id: String,
}

impl EdiAdapter {
    pub fn new(input_dir: impl Into<PathBuf>, archive_dir: impl Into<PathBuf>, partner_id: impl Into<String>) -> Self {
        Self {
            input_dir: input_dir.into(),
            archive_dir: archive_dir.into(),
            partner_id: partner_id.into(),
        }
    }

    async fn candidate_files(&self) -> Vec<PathBuf> {
        let mut entries = match tokio::fs::read_dir(&self.input_dir).await {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        let mut files = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let ext_ok = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| matches!(e, "edi" | "x12" | "txt"))
                .unwrap_or(false);
            if ext_ok {
                files.push(path);
            }
        }
        files.sort();
        files
    }

    async fn files_of_type(&self, edi_type: &str) -> Vec<PathBuf> {
        let mut matched = Vec::new();
        for path in self.candidate_files().await {
            if let Ok(raw) = tokio::fs::read_to_string(&path).await {
                if detect_transaction_type(&raw).as_deref() == Some(edi_type) {
                    matched.push(path);
                }
            }
        }
        matched
    }

    async fn archive(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(&self.archive_dir).await?;
        let dest = self.archive_dir.join(path.file_name().ok_or_else(|| {
            IngestionError::MalformedDocument(format!("file with no name: {}", path.display()))
        })?);
        tokio::fs::rename(path, dest).await?;
        Ok(())
    }
}

#[async_trait]
impl IngestionAdapter for EdiAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Edi
    }

    async fn test_connection(&self) -> Result<bool> {
        Ok(tokio::fs::metadata(&self.input_dir).await.map(|m| m.is_dir()).unwrap_or(false))
    }

    async fn sync_stores(&self) -> Result<SyncResult> {
        tracing::info!("EDI does not carry store master data; use the SFTP adapter");
        Ok(SyncResult::no_data())
    }

    async fn sync_products(&self) -> Result<SyncResult> {
        let mut result = SyncResult::new(SyncStatus::Success);
        for path in self.files_of_type("846").await {
            match tokio::fs::read_to_string(&path).await {
                Ok(raw) => {
                    let items = parse_846(&raw);
                    result.record_success(items.len() as u64);
                    if let Err(e) = self.archive(&path).await {
                        result.record_error(format!("{}: archive failed: {e}", path.display()));
                    }
                }
                Err(e) => result.record_error(format!("{}: {e}", path.display())),
            }
        }
        Ok(result.complete())
    }

    async fn sync_transactions(&self, _since: Option<DateTime<Utc>>) -> Result<SyncResult> {
        let mut result = SyncResult::new(SyncStatus::Success);
        for path in self.files_of_type("810").await {
            match tokio::fs::read_to_string(&path).await {
                Ok(raw) => {
                    let invoice = parse_810(&raw);
                    result.record_success(invoice.line_items.len() as u64);
                    if let Err(e) = self.archive(&path).await {
                        result.record_error(format!("{}: archive failed: {e}", path.display()));
                    }
                }
                Err(e) => result.record_error(format!("{}: {e}", path.display())),
            }
        }
        Ok(result.complete())
    }

    async fn sync_inventory(&self) -> Result<SyncResult> {
        let mut result = SyncResult::new(SyncStatus::Success);
        for path in self.files_of_type("846").await {
            match tokio::fs::read_to_string(&path).await {
                Ok(raw) => {
                    let items = parse_846(&raw);
                    result.record_success(items.len() as u64);
                    if let Err(e) = self.archive(&path).await {
                        result.record_error(format!("{}: archive failed: {e}", path.display()));
                    }
                }
                Err(e) => result.record_error(format!("{}: {e}", path.display())),
            }
        }
        Ok(result.complete())
    }
}

/// Builds the audit-log row for a processed EDI document.
pub fn log_for_document(document_type: &str, direction: EdiDirection, parsed_records: u64, errors: Vec<String>) -> EdiTransactionLog {
    let mut log = EdiTransactionLog::new(document_type, direction);
    log.parsed_records = parsed_records;
    log.status = if errors.is_empty() {
        EdiTransactionStatus::Processed
    } else {
        EdiTransactionStatus::Failed
    };
    log.errors = errors;
    log
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_846: &str = "ISA*00**~GS*IB*X*Y~ST*846*0001~LIN*1*UP*012345678901*IN*099887766~QTY*33*500*EA~QTY*02*120*EA~DTM*405*20240115~N1*WH*Main Warehouse*92*WH001~SE*8*0001~";

    #[test]
    fn detects_846_from_st_segment_not_filename() {
        assert_eq!(detect_transaction_type(SAMPLE_846), Some("846".to_string()));
    }

    #[test]
    fn parses_846_inventory_item() {
        let items = parse_846(SAMPLE_846);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].gtin, "099887766");
        assert_eq!(items[0].upc, "012345678901");
        assert_eq!(items[0].quantity_on_hand, 500);
        assert_eq!(items[0].quantity_on_order, 120);
        assert_eq!(items[0].warehouse_id, "WH001");
        assert_eq!(items[0].as_of_date, NaiveDate::from_ymd_opt(2024, 1, 15));
    }

    #[test]
    fn parses_810_invoice_total_from_cents() {
        let raw = "ST*810*0001~BIG*20240102*INV-1**PO-99~IT1*1*4*EA*12.50**IN*55566677~TDS*5000~SE*6*0001~";
        let invoice = parse_810(raw);
        assert_eq!(invoice.invoice_number, "INV-1");
        assert_eq!(invoice.po_number, "PO-99");
        assert_eq!(invoice.total_amount, 50.0);
        assert_eq!(invoice.line_items.len(), 1);
        assert_eq!(invoice.line_items[0].quantity, 4);
        assert_eq!(invoice.line_items[0].line_total, 50.0);
    }

    #[test]
    fn generate_846_round_trips_through_parse_846() {
        let items = vec![
            Edi846Item {
                gtin: "GTIN-A".to_string(),
                upc: "UPC-A".to_string(),
                quantity_on_hand: 500,
                quantity_on_order: 0,
                warehouse_id: "DC001".to_string(),
                unit_of_measure: "EA".to_string(),
                as_of_date: NaiveDate::from_ymd_opt(2024, 1, 15),
            },
            Edi846Item {
                gtin: "GTIN-B".to_string(),
                upc: "UPC-B".to_string(),
                quantity_on_hand: 250,
                quantity_on_order: 0,
                warehouse_id: "DC001".to_string(),
                unit_of_measure: "CS".to_string(),
                as_of_date: NaiveDate::from_ymd_opt(2024, 1, 15),
            },
        ];
        let now = DateTime::parse_from_rfc3339("2024-01-15T08:00:00Z").unwrap().with_timezone(&Utc);
        let doc = generate_846(&items, now);

        assert_eq!(detect_transaction_type(&doc), Some("846".to_string()));

        let parsed = parse_846(&doc);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].gtin, "GTIN-A");
        assert_eq!(parsed[0].upc, "UPC-A");
        assert_eq!(parsed[0].quantity_on_hand, 500);
        assert_eq!(parsed[0].unit_of_measure, "EA");
        assert_eq!(parsed[0].warehouse_id, "DC001");
        assert_eq!(parsed[0].as_of_date, NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(parsed[1].gtin, "GTIN-B");
        assert_eq!(parsed[1].quantity_on_hand, 250);
        assert_eq!(parsed[1].unit_of_measure, "CS");
    }

    #[test]
    fn generates_850_with_expected_skeleton() {
        let items = vec![Edi850Item {
            gtin: "012345678901".to_string(),
            quantity: 10,
            unit_price: 3.5,
            uom: "EA".to_string(),
        }];
        let now = DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z").unwrap().with_timezone(&Utc);
        let doc = generate_850("PO-1", "VENDOR1", &items, None, now);
        assert!(doc.starts_with("ISA*"));
        assert!(doc.contains("ST*850*0001~"));
        assert!(doc.contains("PO1*1*10*EA*3.50*PE*IN*012345678901~"));
        assert!(doc.ends_with("IEA*1*000000001~"));
    }
}
