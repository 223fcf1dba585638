//! Order selection: the H004 `OrderType` string, or its H005 `BTF`
//! replacement.

/// The order types this engine issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    /// Upload signing public key.
    Ini,
    /// Upload authentication + encryption public keys.
    Hia,
    /// Download bank public keys.
    Hpb,
    /// Download offered accounts (detailed).
    Htd,
    /// Download offered accounts (summary).
    Hkd,
    /// Download available order types.
    Haa,
    /// Download camt.052 account report.
    C52,
    /// Download camt.053 account statement.
    C53,
    /// Download camt.054 debit/credit notification.
    C54,
    /// Upload pain.001 credit transfer.
    Cct,
    /// Upload pain.008 direct debit (not used by this spec's scope, kept
    /// for completeness of the order-type surface).
    Ccc,
}

impl OrderType {
    /// The string EBICS H004 puts in `OrderDetails/OrderType`.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderType::Ini => "INI",
            OrderType::Hia => "HIA",
            OrderType::Hpb => "HPB",
            OrderType::Htd => "HTD",
            OrderType::Hkd => "HKD",
            OrderType::Haa => "HAA",
            OrderType::C52 => "C52",
            OrderType::C53 => "C53",
            OrderType::C54 => "C54",
            OrderType::Cct => "CCT",
            OrderType::Ccc => "CCC",
        }
    }

    /// `true` for order types that fetch data from the bank.
    pub fn is_download(self) -> bool {
        matches!(
            self,
            OrderType::Hpb
                | OrderType::Htd
                | OrderType::Hkd
                | OrderType::Haa
                | OrderType::C52
                | OrderType::C53
                | OrderType::C54
        )
    }
}

/// EBICS 3 Business Transaction Format descriptor, replacing the bare
/// `OrderType` string.
#[derive(Debug, Clone)]
pub struct Btf {
    /// `ServiceName`, e.g. `"STM"` for statements, `"SCT"` for transfers.
    pub service_name: String,
    /// `Scope`, e.g. `"CH"` or `"SEPA"`.
    pub scope: Option<String>,
    /// `MsgName/@value`, e.g. `"camt.053"`.
    pub message_name: String,
    /// `MsgName/@version`, e.g. `"08"`.
    pub message_version: String,
    /// `ServiceOption`, when the bank requires it.
    pub service_option: Option<String>,
    /// `Container/@containerType`, for zipped multi-document downloads.
    pub container: Option<String>,
}

impl Btf {
    /// The BTF descriptor for a camt.053 statement download.
    pub fn camt053() -> Self {
        Btf {
            service_name: "STM".into(),
            scope: Some("SEPA".into()),
            message_name: "camt.053".into(),
            message_version: "08".into(),
            service_option: None,
            container: Some("ZIP".into()),
        }
    }

    /// The BTF descriptor for a camt.052 report download.
    pub fn camt052() -> Self {
        Btf {
            service_name: "STM".into(),
            scope: Some("SEPA".into()),
            message_name: "camt.052".into(),
            message_version: "08".into(),
            service_option: None,
            container: Some("ZIP".into()),
        }
    }

    /// The BTF descriptor for a camt.054 notification download.
    pub fn camt054() -> Self {
        Btf {
            service_name: "REP".into(),
            scope: Some("SEPA".into()),
            message_name: "camt.054".into(),
            message_version: "08".into(),
            service_option: None,
            container: Some("ZIP".into()),
        }
    }

    /// The BTF descriptor for a pain.001 credit transfer upload.
    pub fn pain001() -> Self {
        Btf {
            service_name: "SCT".into(),
            scope: Some("SEPA".into()),
            message_name: "pain.001".into(),
            message_version: "09".into(),
            service_option: None,
            container: None,
        }
    }
}
