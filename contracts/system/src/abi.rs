//! Minimal typed ABI codec for the governance method surface.
//!
//! Covers exactly the types the system contracts use. Method signatures are
//! protocol constants; selectors are the first four bytes of the keccak-256
//! of the signature.

use alloy_primitives::{keccak256, Address, B256, U256};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AbiError {
    #[error("method not in abi: {0}")]
    UnknownMethod(String),
    #[error("{method}: expected {expected} arguments, got {got}")]
    BadArity {
        method: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("abi value is not a {expected}")]
    TypeMismatch { expected: &'static str },
    #[error("return data truncated")]
    ShortData,
    #[error("malformed dynamic offset")]
    BadOffset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Address,
    AddressArray,
    Bool,
    Uint(u16),
    FixedBytes32,
    Bytes,
}

impl ParamType {
    fn type_name(&self) -> String {
        match self {
            ParamType::Address => "address".into(),
            ParamType::AddressArray => "address[]".into(),
            ParamType::Bool => "bool".into(),
            ParamType::Uint(bits) => format!("uint{bits}"),
            ParamType::FixedBytes32 => "bytes32".into(),
            ParamType::Bytes => "bytes".into(),
        }
    }

    fn is_dynamic(&self) -> bool {
        matches!(self, ParamType::AddressArray | ParamType::Bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Address(Address),
    AddressArray(Vec<Address>),
    Bool(bool),
    Uint(U256),
    FixedBytes32(B256),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn as_address(&self) -> Result<Address, AbiError> {
        match self {
            Value::Address(addr) => Ok(*addr),
            _ => Err(AbiError::TypeMismatch {
                expected: "address",
            }),
        }
    }

    pub fn as_address_array(&self) -> Result<Vec<Address>, AbiError> {
        match self {
            Value::AddressArray(addrs) => Ok(addrs.clone()),
            _ => Err(AbiError::TypeMismatch {
                expected: "address[]",
            }),
        }
    }

    pub fn as_bool(&self) -> Result<bool, AbiError> {
        match self {
            Value::Bool(b) => Ok(*b),
            _ => Err(AbiError::TypeMismatch { expected: "bool" }),
        }
    }

    pub fn as_u256(&self) -> Result<U256, AbiError> {
        match self {
            Value::Uint(v) => Ok(*v),
            _ => Err(AbiError::TypeMismatch { expected: "uint256" }),
        }
    }

    pub fn as_u64(&self) -> Result<u64, AbiError> {
        let v = self.as_u256()?;
        u64::try_from(v).map_err(|_| AbiError::TypeMismatch { expected: "uint64" })
    }

    pub fn as_u32(&self) -> Result<u32, AbiError> {
        let v = self.as_u256()?;
        u32::try_from(v).map_err(|_| AbiError::TypeMismatch { expected: "uint32" })
    }

    pub fn as_u8(&self) -> Result<u8, AbiError> {
        let v = self.as_u256()?;
        u8::try_from(v).map_err(|_| AbiError::TypeMismatch { expected: "uint8" })
    }

    pub fn as_bytes32(&self) -> Result<B256, AbiError> {
        match self {
            Value::FixedBytes32(b) => Ok(*b),
            _ => Err(AbiError::TypeMismatch { expected: "bytes32" }),
        }
    }

    pub fn as_bytes(&self) -> Result<Vec<u8>, AbiError> {
        match self {
            Value::Bytes(b) => Ok(b.clone()),
            _ => Err(AbiError::TypeMismatch { expected: "bytes" }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateMutability {
    View,
    NonPayable,
    Payable,
}

#[derive(Debug, Clone)]
pub struct Method {
    pub name: &'static str,
    pub inputs: Vec<ParamType>,
    pub outputs: Vec<ParamType>,
    pub mutability: StateMutability,
}

impl Method {
    pub fn signature(&self) -> String {
        let args: Vec<String> = self.inputs.iter().map(ParamType::type_name).collect();
        format!("{}({})", self.name, args.join(","))
    }

    pub fn selector(&self) -> [u8; 4] {
        let hash = keccak256(self.signature().as_bytes());
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&hash[..4]);
        selector
    }
}

#[derive(Debug, Clone)]
pub struct Abi {
    methods: Vec<Method>,
}

impl Abi {
    pub fn new(methods: Vec<Method>) -> Self {
        Self { methods }
    }

    pub fn method(&self, name: &str) -> Result<&Method, AbiError> {
        self.methods
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| AbiError::UnknownMethod(name.to_string()))
    }

    /// Pack a method call: selector followed by head/tail encoded arguments.
    pub fn encode_call(&self, name: &str, args: &[Value]) -> Result<Vec<u8>, AbiError> {
        let method = self.method(name)?;
        if args.len() != method.inputs.len() {
            return Err(AbiError::BadArity {
                method: method.name,
                expected: method.inputs.len(),
                got: args.len(),
            });
        }
        let mut data = method.selector().to_vec();
        data.extend_from_slice(&encode_values(&method.inputs, args)?);
        Ok(data)
    }

    /// Unpack return data into one value per declared output.
    pub fn decode_output(&self, name: &str, data: &[u8]) -> Result<Vec<Value>, AbiError> {
        let method = self.method(name)?;
        decode_values(&method.outputs, data)
    }
}

/// Head/tail encode a value sequence without a selector. Shared by call
/// packing and by harnesses that fabricate return data.
pub fn encode_values(params: &[ParamType], values: &[Value]) -> Result<Vec<u8>, AbiError> {
    let head_len = 32 * params.len();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();
    for (param, value) in params.iter().zip(values) {
        if param.is_dynamic() {
            head.extend_from_slice(&encode_u256_word(U256::from(head_len + tail.len())));
            tail.extend_from_slice(&encode_tail(param, value)?);
        } else {
            head.extend_from_slice(&encode_static_word(param, value)?);
        }
    }
    head.extend_from_slice(&tail);
    Ok(head)
}

fn encode_static_word(param: &ParamType, value: &Value) -> Result<[u8; 32], AbiError> {
    match (param, value) {
        (ParamType::Address, Value::Address(addr)) => {
            let mut word = [0u8; 32];
            word[12..].copy_from_slice(addr.as_slice());
            Ok(word)
        }
        (ParamType::Bool, Value::Bool(b)) => {
            let mut word = [0u8; 32];
            word[31] = u8::from(*b);
            Ok(word)
        }
        (ParamType::Uint(_), Value::Uint(v)) => Ok(v.to_be_bytes()),
        (ParamType::FixedBytes32, Value::FixedBytes32(b)) => Ok(b.0),
        (param, _) => Err(AbiError::TypeMismatch {
            expected: static_name(param),
        }),
    }
}

fn static_name(param: &ParamType) -> &'static str {
    match param {
        ParamType::Address => "address",
        ParamType::Bool => "bool",
        ParamType::Uint(_) => "uint",
        ParamType::FixedBytes32 => "bytes32",
        ParamType::AddressArray => "address[]",
        ParamType::Bytes => "bytes",
    }
}

fn encode_tail(param: &ParamType, value: &Value) -> Result<Vec<u8>, AbiError> {
    match (param, value) {
        (ParamType::AddressArray, Value::AddressArray(addrs)) => {
            let mut out = encode_u256_word(U256::from(addrs.len())).to_vec();
            for addr in addrs {
                let mut word = [0u8; 32];
                word[12..].copy_from_slice(addr.as_slice());
                out.extend_from_slice(&word);
            }
            Ok(out)
        }
        (ParamType::Bytes, Value::Bytes(bytes)) => {
            let mut out = encode_u256_word(U256::from(bytes.len())).to_vec();
            out.extend_from_slice(bytes);
            let pad = (32 - bytes.len() % 32) % 32;
            out.extend_from_slice(&vec![0u8; pad]);
            Ok(out)
        }
        (param, _) => Err(AbiError::TypeMismatch {
            expected: static_name(param),
        }),
    }
}

fn encode_u256_word(value: U256) -> [u8; 32] {
    value.to_be_bytes()
}

fn read_word(data: &[u8], at: usize) -> Result<[u8; 32], AbiError> {
    let end = at.checked_add(32).ok_or(AbiError::BadOffset)?;
    if end > data.len() {
        return Err(AbiError::ShortData);
    }
    let mut word = [0u8; 32];
    word.copy_from_slice(&data[at..end]);
    Ok(word)
}

fn word_to_usize(word: [u8; 32]) -> Result<usize, AbiError> {
    usize::try_from(U256::from_be_bytes(word)).map_err(|_| AbiError::BadOffset)
}

fn decode_values(params: &[ParamType], data: &[u8]) -> Result<Vec<Value>, AbiError> {
    let mut values = Vec::with_capacity(params.len());
    for (i, param) in params.iter().enumerate() {
        let head = read_word(data, 32 * i)?;
        let value = if param.is_dynamic() {
            decode_tail(param, data, word_to_usize(head)?)?
        } else {
            decode_static(param, head)
        };
        values.push(value);
    }
    Ok(values)
}

fn decode_static(param: &ParamType, word: [u8; 32]) -> Value {
    match param {
        ParamType::Address => Value::Address(Address::from_slice(&word[12..])),
        ParamType::Bool => Value::Bool(word[31] != 0),
        ParamType::Uint(_) => Value::Uint(U256::from_be_bytes(word)),
        ParamType::FixedBytes32 => Value::FixedBytes32(B256::from(word)),
        // dynamic types never reach here
        ParamType::AddressArray | ParamType::Bytes => unreachable!("dynamic param"),
    }
}

fn decode_tail(param: &ParamType, data: &[u8], offset: usize) -> Result<Value, AbiError> {
    let len = word_to_usize(read_word(data, offset)?)?;
    let body = offset.checked_add(32).ok_or(AbiError::BadOffset)?;
    match param {
        ParamType::AddressArray => {
            let mut addrs = Vec::with_capacity(len);
            for i in 0..len {
                let word = read_word(data, body + 32 * i)?;
                addrs.push(Address::from_slice(&word[12..]));
            }
            Ok(Value::AddressArray(addrs))
        }
        ParamType::Bytes => {
            let end = body.checked_add(len).ok_or(AbiError::BadOffset)?;
            if end > data.len() {
                return Err(AbiError::ShortData);
            }
            Ok(Value::Bytes(data[body..end].to_vec()))
        }
        _ => unreachable!("static param"),
    }
}

/// Selector of the canonical `Error(string)` revert wrapper.
pub const REVERT_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Decode the standard revert-string encoding. `None` when the data does not
/// carry a well-formed `Error(string)` payload.
pub fn decode_revert(data: &[u8]) -> Option<String> {
    if data.len() < 4 || data[..4] != REVERT_SELECTOR {
        return None;
    }
    let body = &data[4..];
    let offset = word_to_usize(read_word(body, 0).ok()?).ok()?;
    let len = word_to_usize(read_word(body, offset).ok()?).ok()?;
    let start = offset.checked_add(32)?;
    let end = start.checked_add(len)?;
    if end > body.len() {
        return None;
    }
    String::from_utf8(body[start..end].to_vec()).ok()
}

/// Encode a revert reason the way Solidity's `revert("...")` does. Used by
/// test harnesses that script reverting calls.
pub fn encode_revert(reason: &str) -> Vec<u8> {
    let mut out = REVERT_SELECTOR.to_vec();
    out.extend_from_slice(&encode_u256_word(U256::from(32)));
    out.extend_from_slice(&encode_u256_word(U256::from(reason.len())));
    out.extend_from_slice(reason.as_bytes());
    let pad = (32 - reason.len() % 32) % 32;
    out.extend_from_slice(&vec![0u8; pad]);
    out
}
