//! Solidity ABI encoding for the TodoList contract surface.
//!
//! Only the shapes the contract uses are supported: `uint256` (held as `u64`),
//! `bool` and a single dynamic `string`.

use sha3::{Digest, Keccak256};
use td_api_types::Task;
use thiserror::Error;

pub const TASK_COUNT: &str = "taskCount()";
pub const TASKS: &str = "tasks(uint256)";
pub const CREATE_TASK: &str = "createTask(string)";
pub const TOGGLE_COMPLETED: &str = "toggleCompleted(uint256)";

const WORD: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AbiError {
    #[error("abi data truncated: needed {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },
    #[error("value does not fit in 64 bits")]
    ValueOverflow,
    #[error("invalid bool word")]
    InvalidBool,
    #[error("string is not valid utf-8")]
    InvalidUtf8,
    #[error("invalid hex: {0}")]
    BadHex(String),
    #[error("unknown function selector 0x{0}")]
    UnknownSelector(String),
}

/// A decoded call into the TodoList contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    TaskCount,
    Tasks(u64),
    CreateTask(String),
    ToggleCompleted(u64),
}

pub fn selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

pub fn encode_call(call: &Call) -> Vec<u8> {
    match call {
        Call::TaskCount => selector(TASK_COUNT).to_vec(),
        Call::Tasks(index) => {
            let mut out = selector(TASKS).to_vec();
            out.extend_from_slice(&uint_word(*index));
            out
        }
        Call::CreateTask(content) => {
            let mut out = selector(CREATE_TASK).to_vec();
            out.extend_from_slice(&uint_word(WORD as u64));
            push_string_tail(&mut out, content);
            out
        }
        Call::ToggleCompleted(index) => {
            let mut out = selector(TOGGLE_COMPLETED).to_vec();
            out.extend_from_slice(&uint_word(*index));
            out
        }
    }
}

pub fn decode_call(data: &[u8]) -> Result<Call, AbiError> {
    let head = take(data, 0, 4)?;
    let args = &data[4..];
    let sel = [head[0], head[1], head[2], head[3]];

    if sel == selector(TASK_COUNT) {
        Ok(Call::TaskCount)
    } else if sel == selector(TASKS) {
        Ok(Call::Tasks(read_uint(args, 0)?))
    } else if sel == selector(CREATE_TASK) {
        let offset = usize_from(read_uint(args, 0)?)?;
        Ok(Call::CreateTask(read_string(args, offset)?))
    } else if sel == selector(TOGGLE_COMPLETED) {
        Ok(Call::ToggleCompleted(read_uint(args, 0)?))
    } else {
        Err(AbiError::UnknownSelector(to_hex_raw(&sel)))
    }
}

/// Return data of `taskCount()`.
pub fn encode_uint(value: u64) -> Vec<u8> {
    uint_word(value).to_vec()
}

pub fn decode_uint(data: &[u8]) -> Result<u64, AbiError> {
    read_uint(data, 0)
}

/// Return data of `tasks(uint256)`: the tuple `(uint256 id, string content, bool done)`.
pub fn encode_task(task: &Task) -> Vec<u8> {
    let mut out = Vec::with_capacity(WORD * 5);
    out.extend_from_slice(&uint_word(task.id));
    out.extend_from_slice(&uint_word((WORD * 3) as u64));
    out.extend_from_slice(&uint_word(u64::from(task.done)));
    push_string_tail(&mut out, &task.content);
    out
}

pub fn decode_task(data: &[u8]) -> Result<Task, AbiError> {
    let id = read_uint(data, 0)?;
    let offset = usize_from(read_uint(data, WORD)?)?;
    let done = match read_uint(data, WORD * 2)? {
        0 => false,
        1 => true,
        _ => return Err(AbiError::InvalidBool),
    };
    let content = read_string(data, offset)?;
    Ok(Task { id, content, done })
}

pub fn to_hex(input: &[u8]) -> String {
    format!("0x{}", to_hex_raw(input))
}

pub fn from_hex(input: &str) -> Result<Vec<u8>, AbiError> {
    let raw = input.strip_prefix("0x").unwrap_or(input);
    if !raw.is_ascii() || raw.len() % 2 != 0 {
        return Err(AbiError::BadHex(input.to_owned()));
    }
    raw.as_bytes()
        .chunks(2)
        .map(|pair| {
            let high = char::from(pair[0]).to_digit(16);
            let low = char::from(pair[1]).to_digit(16);
            match (high, low) {
                (Some(high), Some(low)) => Ok((high * 16 + low) as u8),
                _ => Err(AbiError::BadHex(input.to_owned())),
            }
        })
        .collect()
}

fn to_hex_raw(input: &[u8]) -> String {
    let mut output = String::with_capacity(input.len() * 2);
    for byte in input {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

fn uint_word(value: u64) -> [u8; WORD] {
    let mut word = [0_u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

fn push_string_tail(out: &mut Vec<u8>, value: &str) {
    let bytes = value.as_bytes();
    out.extend_from_slice(&uint_word(bytes.len() as u64));
    out.extend_from_slice(bytes);
    let padding = (WORD - bytes.len() % WORD) % WORD;
    out.extend(std::iter::repeat_n(0_u8, padding));
}

fn take(data: &[u8], start: usize, len: usize) -> Result<&[u8], AbiError> {
    let end = start.saturating_add(len);
    data.get(start..end).ok_or(AbiError::Truncated {
        needed: end,
        got: data.len(),
    })
}

fn read_uint(data: &[u8], at: usize) -> Result<u64, AbiError> {
    let word = take(data, at, WORD)?;
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(AbiError::ValueOverflow);
    }
    let mut tail = [0_u8; 8];
    tail.copy_from_slice(&word[WORD - 8..]);
    Ok(u64::from_be_bytes(tail))
}

fn read_string(data: &[u8], offset: usize) -> Result<String, AbiError> {
    let len = usize_from(read_uint(data, offset)?)?;
    let bytes = take(data, offset + WORD, len)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| AbiError::InvalidUtf8)
}

fn usize_from(value: u64) -> Result<usize, AbiError> {
    usize::try_from(value).map_err(|_| AbiError::ValueOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_matches_known_erc20_selector() {
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(selector("balanceOf(address)"), [0x70, 0xa0, 0x82, 0x31]);
    }

    #[test]
    fn create_task_calldata_is_offset_length_padded() {
        let data = encode_call(&Call::CreateTask("hello world".to_owned()));
        assert_eq!(data.len(), 4 + WORD * 3);
        assert_eq!(read_uint(&data[4..], 0).unwrap(), 32);
        assert_eq!(read_uint(&data[4..], WORD).unwrap(), 11);
        assert_eq!(&data[4 + WORD * 2..4 + WORD * 2 + 11], b"hello world");
        assert_eq!(
            decode_call(&data).unwrap(),
            Call::CreateTask("hello world".to_owned())
        );
    }

    #[test]
    fn task_tuple_with_multi_word_content() {
        let task = Task {
            id: 7,
            content: "a task description that is longer than one abi word".to_owned(),
            done: true,
        };
        let data = encode_task(&task);
        assert_eq!(data.len() % WORD, 0);
        assert_eq!(decode_task(&data).unwrap(), task);
    }

    #[test]
    fn decode_rejects_truncated_and_oversized_words() {
        assert!(matches!(decode_uint(&[0_u8; 31]), Err(AbiError::Truncated { .. })));

        let mut word = [0_u8; WORD];
        word[0] = 1;
        assert_eq!(decode_uint(&word), Err(AbiError::ValueOverflow));
    }

    #[test]
    fn unknown_selector_is_reported() {
        let err = decode_call(&[0xde, 0xad, 0xbe, 0xef]).unwrap_err();
        assert_eq!(err, AbiError::UnknownSelector("deadbeef".to_owned()));
    }

    #[test]
    fn hex_helpers() {
        assert_eq!(to_hex(&[0x00, 0xab]), "0x00ab");
        assert_eq!(from_hex("0x00ab").unwrap(), vec![0x00, 0xab]);
        assert!(from_hex("0xabc").is_err());
        assert!(from_hex("zz").is_err());
        assert_eq!(from_hex("0xABcd").unwrap(), vec![0xab, 0xcd]);
    }

    #[test]
    fn non_ascii_hex_is_rejected() {
        assert_eq!(
            from_hex("0xaé0"),
            Err(AbiError::BadHex("0xaé0".to_owned()))
        );
        assert!(from_hex("0xé").is_err());
        assert!(from_hex("+1").is_err());
    }
}
