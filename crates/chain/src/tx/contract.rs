//! Contract dialect: a msgpack envelope whose data region is typed by the
//! referenced contract's declared parameter list.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::codec::ByteReader;
use crate::contract::{ContractDescriptor, ContractRegistry, FieldType};
use crate::error::BlockError;
use crate::types::Hash;

/// The wire envelope of a contract-dialect transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SmartTx {
    /// Contract id; also the frame's dispatch tag.
    #[serde(rename = "type")]
    pub tx_type: i64,
    pub time: i64,
    pub user_id: i64,
    pub state_id: i64,
    pub public_key: Vec<u8>,
    pub bin_signatures: Vec<u8>,
    /// Byte-packed parameter region, schema defined by the contract.
    pub data: Vec<u8>,
}

impl SmartTx {
    /// Canonical prefix of the sign-string; decoded parameters are appended
    /// one by one in declaration order.
    pub fn for_sign(&self) -> String {
        format!(
            "{},{},{},{}",
            self.tx_type, self.time, self.user_id, self.state_id
        )
    }
}

/// A decoded contract parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ContractValue {
    Uint(u64),
    Float(f64),
    Int(i64),
    Decimal(Decimal),
    Str(String),
    /// Raw bytes travel through the parameter map hex-encoded.
    Bytes(String),
    List(Vec<String>),
}

impl fmt::Display for ContractValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractValue::Uint(v) => write!(f, "{}", v),
            ContractValue::Float(v) => write!(f, "{}", v),
            ContractValue::Int(v) => write!(f, "{}", v),
            ContractValue::Decimal(v) => write!(f, "{}", v),
            ContractValue::Str(v) => write!(f, "{}", v),
            ContractValue::Bytes(v) => write!(f, "{}", v),
            ContractValue::List(v) => write!(f, "{}", v.join(",")),
        }
    }
}

/// Fully parsed contract-dialect transaction.
#[derive(Debug)]
pub struct ContractTx {
    pub smart: SmartTx,
    /// Shared reference into the process-wide registry.
    pub contract: Arc<ContractDescriptor>,
    /// Decoded parameters keyed by declared name, plus the synthetic
    /// `forsign` entry.
    pub data: HashMap<String, ContractValue>,
    pub forsign: String,
}

pub(crate) fn parse_contract_tx(
    registry: &ContractRegistry,
    body: &[u8],
    tx_hash: &Hash,
) -> Result<ContractTx, BlockError> {
    let smart: SmartTx = rmp_serde::from_slice(body).map_err(|e| {
        error!(tx_hash = %tx_hash, reason = %e, "unmarshalling smart tx msgpack");
        BlockError::MalformedFrame(format!("smart tx msgpack: {}", e))
    })?;

    let contract = registry.by_id(smart.tx_type).ok_or_else(|| {
        error!(tx_hash = %tx_hash, contract_type = smart.tx_type, "unknown contract");
        BlockError::UnknownContract(smart.tx_type)
    })?;

    let mut forsign = smart.for_sign();
    let mut data = HashMap::with_capacity(contract.fields.len() + 1);
    let mut input = ByteReader::new(&smart.data);

    for field in &contract.fields {
        let mut forv: Option<String> = None;
        let value = match field.ftype {
            FieldType::Uint64 => ContractValue::Uint(input.read_u64()?),
            FieldType::Float64 => ContractValue::Float(input.read_f64()?),
            FieldType::Int64 => ContractValue::Int(input.decode_len_i64()?),
            FieldType::Decimal => ContractValue::Decimal(input.read_decimal()?),
            FieldType::String => ContractValue::Str(input.read_string()?),
            FieldType::Bytes => ContractValue::Bytes(hex::encode(input.read_byte_slice()?)),
            FieldType::List => {
                let items = input.read_list()?;
                forv = Some(items.join(","));
                ContractValue::List(items)
            }
        };
        data.insert(field.name.clone(), value.clone());

        if field.tags.contains("image") {
            continue;
        }
        let rendered = match forv {
            Some(s) => s,
            None => value.to_string(),
        };
        forsign.push(',');
        forsign.push_str(&rendered);
    }

    data.insert("forsign".to_string(), ContractValue::Str(forsign.clone()));

    Ok(ContractTx {
        smart,
        contract,
        data,
        forsign,
    })
}
