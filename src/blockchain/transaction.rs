//! Transaction building, wire encoding, and signature bookkeeping.
//!
//! # Responsibilities
//! - Build native-token transfer transactions
//! - Encode/decode the legacy message and transaction wire format
//! - Track which signer slots are filled and verify them
//!
//! # Wire Format
//! ```text
//! transaction = shortvec(signatures) ‖ 64B * n ‖ message
//! message     = header(3B) ‖ shortvec(keys) ‖ 32B * k ‖ blockhash(32B)
//!               ‖ shortvec(instructions) ‖ instruction * m
//! instruction = program_idx(1B) ‖ shortvec(accounts) ‖ idx * a
//!               ‖ shortvec(data) ‖ data
//! ```

use ed25519_dalek::{Signature as Ed25519Signature, VerifyingKey};

use crate::blockchain::types::{BlockchainError, BlockchainResult, Hash, Pubkey, Signature};

/// The system program owns native-token transfers. Its id is the all-zero key.
pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey::new([0u8; 32]);

/// System program instruction discriminant for `Transfer`.
const SYSTEM_TRANSFER_INDEX: u32 = 2;

/// Append a compact-u16 length prefix.
pub fn encode_shortvec_len(len: usize, out: &mut Vec<u8>) -> BlockchainResult<()> {
    if len > u16::MAX as usize {
        return Err(BlockchainError::Encoding(format!(
            "length {} does not fit a compact-u16",
            len
        )));
    }
    let mut rem = len;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            out.push(byte);
            return Ok(());
        }
        byte |= 0x80;
        out.push(byte);
    }
}

/// Decode a compact-u16 length prefix, returning `(len, bytes_consumed)`.
pub fn decode_shortvec_len(bytes: &[u8]) -> BlockchainResult<(usize, usize)> {
    let mut value = 0usize;
    for i in 0..3 {
        let byte = *bytes
            .get(i)
            .ok_or_else(|| BlockchainError::Encoding("truncated compact-u16".to_string()))?;
        value |= ((byte & 0x7f) as usize) << (7 * i);
        if byte & 0x80 == 0 {
            if value > u16::MAX as usize {
                break;
            }
            return Ok((value, i + 1));
        }
    }
    Err(BlockchainError::Encoding("compact-u16 overflow".to_string()))
}

/// Message header: how many leading account keys sign, and how many are read-only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

/// An instruction with its program and accounts as indices into the key table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

/// The signed portion of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: Hash,
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// Build a single-instruction native-token transfer message.
    ///
    /// The payer is the only signer and is listed first. A self-transfer
    /// collapses source and destination into one key.
    pub fn new_transfer(from: &Pubkey, to: &Pubkey, lamports: u64, recent_blockhash: Hash) -> Self {
        let mut data = Vec::with_capacity(12);
        data.extend_from_slice(&SYSTEM_TRANSFER_INDEX.to_le_bytes());
        data.extend_from_slice(&lamports.to_le_bytes());

        let (account_keys, accounts) = if from == to {
            (vec![*from, SYSTEM_PROGRAM_ID], vec![0, 0])
        } else {
            (vec![*from, *to, SYSTEM_PROGRAM_ID], vec![0, 1])
        };
        let program_id_index = (account_keys.len() - 1) as u8;

        Self {
            header: MessageHeader {
                num_required_signatures: 1,
                num_readonly_signed_accounts: 0,
                num_readonly_unsigned_accounts: 1,
            },
            account_keys,
            recent_blockhash,
            instructions: vec![CompiledInstruction {
                program_id_index,
                accounts,
                data,
            }],
        }
    }

    /// Keys whose signatures this message requires, in slot order.
    pub fn signer_keys(&self) -> &[Pubkey] {
        let n = (self.header.num_required_signatures as usize).min(self.account_keys.len());
        &self.account_keys[..n]
    }

    pub fn serialize(&self) -> BlockchainResult<Vec<u8>> {
        let mut out = Vec::with_capacity(3 + 1 + self.account_keys.len() * 32 + 32 + 32);
        out.push(self.header.num_required_signatures);
        out.push(self.header.num_readonly_signed_accounts);
        out.push(self.header.num_readonly_unsigned_accounts);

        encode_shortvec_len(self.account_keys.len(), &mut out)?;
        for key in &self.account_keys {
            out.extend_from_slice(key.as_bytes());
        }
        out.extend_from_slice(&self.recent_blockhash.0);

        encode_shortvec_len(self.instructions.len(), &mut out)?;
        for ix in &self.instructions {
            out.push(ix.program_id_index);
            encode_shortvec_len(ix.accounts.len(), &mut out)?;
            out.extend_from_slice(&ix.accounts);
            encode_shortvec_len(ix.data.len(), &mut out)?;
            out.extend_from_slice(&ix.data);
        }
        Ok(out)
    }

    fn read(reader: &mut Reader<'_>) -> BlockchainResult<Self> {
        let header = MessageHeader {
            num_required_signatures: reader.byte()?,
            num_readonly_signed_accounts: reader.byte()?,
            num_readonly_unsigned_accounts: reader.byte()?,
        };

        let key_count = reader.shortvec()?;
        let mut account_keys = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            account_keys.push(Pubkey(reader.array::<32>()?));
        }
        let recent_blockhash = Hash(reader.array::<32>()?);

        let ix_count = reader.shortvec()?;
        let mut instructions = Vec::with_capacity(ix_count);
        for _ in 0..ix_count {
            let program_id_index = reader.byte()?;
            let n = reader.shortvec()?;
            let accounts = reader.take(n)?.to_vec();
            let n = reader.shortvec()?;
            let data = reader.take(n)?.to_vec();
            instructions.push(CompiledInstruction {
                program_id_index,
                accounts,
                data,
            });
        }

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions,
        })
    }
}

/// A message plus one signature slot per required signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub signatures: Vec<Signature>,
    pub message: Message,
}

impl Transaction {
    /// Wrap a message with empty signature slots.
    pub fn new_unsigned(message: Message) -> Self {
        let slots = message.header.num_required_signatures as usize;
        Self {
            signatures: vec![Signature::default(); slots],
            message,
        }
    }

    /// The bytes a signer must sign.
    pub fn message_data(&self) -> BlockchainResult<Vec<u8>> {
        self.message.serialize()
    }

    /// Place a signature in the slot belonging to `signer`.
    pub fn add_signature(&mut self, signer: &Pubkey, signature: Signature) -> BlockchainResult<()> {
        let slot = self
            .message
            .signer_keys()
            .iter()
            .position(|k| k == signer)
            .ok_or_else(|| {
                BlockchainError::Signing(format!("{} is not a required signer", signer))
            })?;
        let slots = self.signatures.len();
        let entry = self.signatures.get_mut(slot).ok_or_else(|| {
            BlockchainError::Signing(format!(
                "transaction has {} signature slots, signer needs slot {}",
                slots, slot
            ))
        })?;
        *entry = signature;
        Ok(())
    }

    /// True when every required slot holds a non-placeholder signature.
    pub fn is_signed(&self) -> bool {
        self.signatures.len() == self.message.header.num_required_signatures as usize
            && self.signatures.iter().all(|s| !s.is_placeholder())
    }

    /// Check every signature against its signer key.
    pub fn verify(&self) -> bool {
        let Ok(data) = self.message_data() else {
            return false;
        };
        let signers = self.message.signer_keys();
        if signers.len() != self.signatures.len() {
            return false;
        }
        signers.iter().zip(&self.signatures).all(|(key, sig)| {
            VerifyingKey::from_bytes(key.as_bytes())
                .map(|vk| {
                    vk.verify_strict(&data, &Ed25519Signature::from_bytes(sig.as_bytes()))
                        .is_ok()
                })
                .unwrap_or(false)
        })
    }

    /// The transaction id: the fee payer's signature.
    pub fn signature(&self) -> Option<&Signature> {
        self.signatures.first()
    }

    pub fn serialize(&self) -> BlockchainResult<Vec<u8>> {
        let message = self.message.serialize()?;
        let mut out = Vec::with_capacity(1 + self.signatures.len() * 64 + message.len());
        encode_shortvec_len(self.signatures.len(), &mut out)?;
        for sig in &self.signatures {
            out.extend_from_slice(sig.as_bytes());
        }
        out.extend_from_slice(&message);
        Ok(out)
    }

    pub fn deserialize(bytes: &[u8]) -> BlockchainResult<Self> {
        let mut reader = Reader { bytes, pos: 0 };
        let sig_count = reader.shortvec()?;
        let mut signatures = Vec::with_capacity(sig_count);
        for _ in 0..sig_count {
            signatures.push(Signature(reader.array::<64>()?));
        }
        let message = Message::read(&mut reader)?;
        if reader.pos != bytes.len() {
            return Err(BlockchainError::Encoding(format!(
                "{} trailing bytes after transaction",
                bytes.len() - reader.pos
            )));
        }
        Ok(Self { signatures, message })
    }

    /// Decode a system-program transfer as `(from, to, lamports)`.
    pub fn system_transfer(&self) -> Option<(Pubkey, Pubkey, u64)> {
        let [ix] = self.message.instructions.as_slice() else {
            return None;
        };
        let keys = &self.message.account_keys;
        if keys.get(ix.program_id_index as usize) != Some(&SYSTEM_PROGRAM_ID) || ix.data.len() != 12 {
            return None;
        }
        let index = u32::from_le_bytes(ix.data[..4].try_into().ok()?);
        if index != SYSTEM_TRANSFER_INDEX {
            return None;
        }
        let lamports = u64::from_le_bytes(ix.data[4..].try_into().ok()?);
        let from = *keys.get(*ix.accounts.first()? as usize)?;
        let to = *keys.get(*ix.accounts.get(1)? as usize)?;
        Some((from, to, lamports))
    }
}

/// Build an unsigned transfer of `lamports` from `from` to `to`.
pub fn system_transfer(from: &Pubkey, to: &Pubkey, lamports: u64, recent_blockhash: Hash) -> Transaction {
    Transaction::new_unsigned(Message::new_transfer(from, to, lamports, recent_blockhash))
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> BlockchainResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| BlockchainError::Encoding("truncated transaction".to_string()))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> BlockchainResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn array<const N: usize>(&mut self) -> BlockchainResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn shortvec(&mut self) -> BlockchainResult<usize> {
        let (len, used) = decode_shortvec_len(&self.bytes[self.pos..])?;
        self.pos += used;
        Ok(len)
    }
}
