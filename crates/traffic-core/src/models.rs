use serde::{Deserialize, Serialize};

/// Network transport a byte counter was recorded on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Cellular data.
    Mobile,
    /// Wi-Fi.
    #[serde(alias = "wi-fi")]
    Wifi,
}

/// Bytes split by transport only (used by hourly series).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportBytes {
    pub mobile_bytes: u64,
    pub wifi_bytes: u64,
}

impl TransportBytes {
    /// Add `bytes` to the counter for `transport`.
    pub fn add(&mut self, transport: Transport, bytes: u64) {
        match transport {
            Transport::Mobile => self.mobile_bytes = self.mobile_bytes.saturating_add(bytes),
            Transport::Wifi => self.wifi_bytes = self.wifi_bytes.saturating_add(bytes),
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.mobile_bytes.saturating_add(self.wifi_bytes)
    }
}

/// Raw per-application counters as reported by a usage source.
///
/// A consistent source satisfies `mobile + wifi == rx + tx`. Counters
/// saturate at `u64::MAX` instead of wrapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteCounters {
    pub mobile_bytes: u64,
    pub wifi_bytes: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

impl ByteCounters {
    /// Accumulate one usage sample received/transmitted on `transport`.
    pub fn add_sample(&mut self, transport: Transport, rx: u64, tx: u64) {
        let bytes = rx.saturating_add(tx);
        match transport {
            Transport::Mobile => self.mobile_bytes = self.mobile_bytes.saturating_add(bytes),
            Transport::Wifi => self.wifi_bytes = self.wifi_bytes.saturating_add(bytes),
        }
        self.rx_bytes = self.rx_bytes.saturating_add(rx);
        self.tx_bytes = self.tx_bytes.saturating_add(tx);
    }

    /// Total bytes across both transports.
    pub fn total_bytes(&self) -> u64 {
        self.mobile_bytes.saturating_add(self.wifi_bytes)
    }
}

/// One row per application for a given query window.
///
/// Rows are rebuilt on every aggregation pass and never edited afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppTrafficData {
    /// Unique key of the application within one result.
    #[serde(rename = "packageName")]
    pub package_id: String,
    /// Display name; may repeat across packages.
    pub app_name: String,
    pub total_bytes: u64,
    pub mobile_bytes: u64,
    pub wifi_bytes: u64,
    /// Downlink bytes.
    pub rx_bytes: u64,
    /// Uplink bytes.
    pub tx_bytes: u64,
}

impl AppTrafficData {
    /// Build a row from source counters. `total_bytes` is always
    /// `mobile_bytes + wifi_bytes`.
    pub fn from_counters(
        package_id: impl Into<String>,
        app_name: impl Into<String>,
        counters: &ByteCounters,
    ) -> Self {
        Self {
            package_id: package_id.into(),
            app_name: app_name.into(),
            total_bytes: counters.total_bytes(),
            mobile_bytes: counters.mobile_bytes,
            wifi_bytes: counters.wifi_bytes,
            rx_bytes: counters.rx_bytes,
            tx_bytes: counters.tx_bytes,
        }
    }
}

/// Device-wide aggregate for the same window as a set of [`AppTrafficData`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalTrafficData {
    pub total_bytes: u64,
    pub mobile_bytes: u64,
    pub wifi_bytes: u64,
}

impl TotalTrafficData {
    /// Sum the per-application rows of one window.
    pub fn from_rows(rows: &[AppTrafficData]) -> Self {
        rows.iter().fold(Self::default(), |mut acc, row| {
            acc.total_bytes = acc.total_bytes.saturating_add(row.total_bytes);
            acc.mobile_bytes = acc.mobile_bytes.saturating_add(row.mobile_bytes);
            acc.wifi_bytes = acc.wifi_bytes.saturating_add(row.wifi_bytes);
            acc
        })
    }
}

/// Traffic of one hour of the day, for charting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyBucket {
    /// Hour of day, `0..=23`.
    pub hour: u32,
    pub mobile_bytes: u64,
    pub wifi_bytes: u64,
}

impl HourlyBucket {
    /// A zero-valued bucket for `hour`.
    pub fn empty(hour: u32) -> Self {
        Self {
            hour,
            mobile_bytes: 0,
            wifi_bytes: 0,
        }
    }

    /// Combined bytes of the hour.
    pub fn bytes(&self) -> u64 {
        self.mobile_bytes.saturating_add(self.wifi_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters(mobile: u64, wifi: u64, rx: u64, tx: u64) -> ByteCounters {
        ByteCounters {
            mobile_bytes: mobile,
            wifi_bytes: wifi,
            rx_bytes: rx,
            tx_bytes: tx,
        }
    }

    #[test]
    fn test_add_sample_splits_by_transport() {
        let mut c = ByteCounters::default();
        c.add_sample(Transport::Mobile, 100, 20);
        c.add_sample(Transport::Wifi, 300, 80);

        assert_eq!(c.mobile_bytes, 120);
        assert_eq!(c.wifi_bytes, 380);
        assert_eq!(c.rx_bytes, 400);
        assert_eq!(c.tx_bytes, 100);
        assert_eq!(c.total_bytes(), c.rx_bytes + c.tx_bytes);
    }

    #[test]
    fn test_add_sample_saturates_at_max() {
        let mut c = ByteCounters::default();
        c.add_sample(Transport::Mobile, u64::MAX, 1);
        c.add_sample(Transport::Wifi, u64::MAX, 0);

        assert_eq!(c.mobile_bytes, u64::MAX);
        assert_eq!(c.rx_bytes, u64::MAX);
        assert_eq!(c.tx_bytes, 1);
        assert_eq!(c.total_bytes(), u64::MAX);
    }

    #[test]
    fn test_transport_bytes_saturate() {
        let mut t = TransportBytes::default();
        t.add(Transport::Wifi, u64::MAX);
        t.add(Transport::Wifi, 10);
        t.add(Transport::Mobile, 5);
        assert_eq!(t.wifi_bytes, u64::MAX);
        assert_eq!(t.total_bytes(), u64::MAX);
    }

    #[test]
    fn test_row_total_is_mobile_plus_wifi() {
        let row = AppTrafficData::from_counters("pkg.a", "A", &counters(2048, 1024, 2048, 1024));
        assert_eq!(row.total_bytes, 3072);
        assert_eq!(row.mobile_bytes + row.wifi_bytes, row.total_bytes);
        assert_eq!(row.rx_bytes + row.tx_bytes, row.total_bytes);
    }

    #[test]
    fn test_total_from_rows() {
        let rows = vec![
            AppTrafficData::from_counters("a", "A", &counters(2048, 1024, 2048, 1024)),
            AppTrafficData::from_counters("b", "B", &counters(0, 512, 256, 256)),
        ];
        let total = TotalTrafficData::from_rows(&rows);
        assert_eq!(total.total_bytes, 3584);
        assert_eq!(total.mobile_bytes, 2048);
        assert_eq!(total.wifi_bytes, 1536);
    }

    #[test]
    fn test_total_from_rows_saturates() {
        let rows = vec![
            AppTrafficData::from_counters("a", "A", &counters(u64::MAX, 0, u64::MAX, 0)),
            AppTrafficData::from_counters("b", "B", &counters(7, 0, 7, 0)),
        ];
        let total = TotalTrafficData::from_rows(&rows);
        assert_eq!(total.total_bytes, u64::MAX);
        assert_eq!(total.mobile_bytes, u64::MAX);
    }

    #[test]
    fn test_total_from_no_rows_is_zero() {
        assert_eq!(TotalTrafficData::from_rows(&[]), TotalTrafficData::default());
    }

    #[test]
    fn test_row_serializes_with_package_name_key() {
        let row = AppTrafficData::from_counters("com.example", "Example", &counters(1, 2, 3, 0));
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["packageName"], "com.example");
        assert_eq!(value["appName"], "Example");
        assert_eq!(value["totalBytes"], 3);
        assert_eq!(value["rxBytes"], 3);
    }

    #[test]
    fn test_transport_accepts_wi_fi_alias() {
        let t: Transport = serde_json::from_str("\"wi-fi\"").unwrap();
        assert_eq!(t, Transport::Wifi);
        let t: Transport = serde_json::from_str("\"mobile\"").unwrap();
        assert_eq!(t, Transport::Mobile);
    }

    #[test]
    fn test_hourly_bucket_bytes() {
        let mut bucket = HourlyBucket::empty(7);
        assert_eq!(bucket.bytes(), 0);
        bucket.mobile_bytes = 5;
        bucket.wifi_bytes = 6;
        assert_eq!(bucket.bytes(), 11);

        bucket.mobile_bytes = u64::MAX;
        assert_eq!(bucket.bytes(), u64::MAX);
    }
}
