//! In-memory collaborators for exercising the block pipeline end to end.
//!
//! `MemStorage` is fully in-memory and transactional: writes issued on an
//! open transaction are staged as an op log and replayed at commit, so
//! rollback really does discard them while the autocommit side-channel
//! (`mark_tx_used_now`, `record_bad_transaction`) stays durable. The
//! used-table drain records the row set it saw at call time, matching the
//! statement-level visibility of a relational store.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use praxis_chain::tx::structs::FirstBlockTx;
use praxis_chain::{
    Block, BlockCore, BlockError, BlockHeader, CallFlags, ContractDescriptor,
    ContractInterpreter, ContractRegistry, ContractTx, Crypto, Hash, RegularHandler,
    RegularTxRegistry, Sha3Crypto, SmartTx, Storage, StorageError, StorageTx, SysPar,
    TxContext, TxHeader, TxType,
};

// ════════════════════════════════════════════════════════════════════════════
// IN-MEMORY STORAGE
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    pub tables: Vec<(String, String)>,
    pub log: Vec<Vec<u8>>,
    pub used: HashSet<Hash>,
    pub bad: Vec<(Hash, String)>,
    pub status: HashMap<Hash, u32>,
    pub headers: HashMap<u32, BlockHeader>,
    pub chain: Vec<(u32, Vec<u8>)>,
    pub info: Option<BlockHeader>,
    pub node_keys: HashMap<(i64, u32), Vec<u8>>,
    pub sleep: i64,
}

pub struct MemStorage {
    pub inner: Mutex<StoreState>,
    /// When set, `insert_log` fails for this exact transaction frame.
    pub fail_insert_log_for: Mutex<Option<Vec<u8>>>,
}

impl MemStorage {
    pub fn new() -> Self {
        let mut state = StoreState::default();
        state.tables = vec![
            ("keys".to_string(), "id".to_string()),
            ("members".to_string(), "id".to_string()),
        ];
        MemStorage {
            inner: Mutex::new(state),
            fail_insert_log_for: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> StoreState {
        self.inner.lock().clone()
    }

    pub fn set_node_key(&self, wallet_id: i64, state_id: u32, pubkey: &[u8]) {
        // chain state stores node keys hex-encoded
        self.inner
            .lock()
            .node_keys
            .insert((wallet_id, state_id), hex::encode(pubkey).into_bytes());
    }

    pub fn set_sleep(&self, secs: i64) {
        self.inner.lock().sleep = secs;
    }

    pub fn header_hash(&self, block_id: u32) -> Vec<u8> {
        self.inner
            .lock()
            .headers
            .get(&block_id)
            .map(|h| h.hash.clone())
            .unwrap_or_default()
    }
}

enum Op {
    DeleteUsed { existing: HashSet<Hash> },
    MarkUsed(Hash),
    Status(u32, Hash),
    Log(Vec<u8>),
    BlockInfo(BlockHeader),
    Chain(u32, BlockHeader, Vec<u8>),
}

pub struct MemTx<'a> {
    store: &'a MemStorage,
    ops: Vec<Op>,
}

impl<'a> StorageTx for MemTx<'a> {
    fn delete_used_transactions(&mut self) -> Result<(), StorageError> {
        let existing = self.store.inner.lock().used.clone();
        self.ops.push(Op::DeleteUsed { existing });
        Ok(())
    }

    fn mark_tx_used(&mut self, hash: &Hash) -> Result<(), StorageError> {
        self.ops.push(Op::MarkUsed(hash.clone()));
        Ok(())
    }

    fn update_tx_status_block(&mut self, block_id: u32, hash: &Hash) -> Result<(), StorageError> {
        self.ops.push(Op::Status(block_id, hash.clone()));
        Ok(())
    }

    fn insert_log(&mut self, full_data: &[u8], _time: i64) -> Result<(), StorageError> {
        if self.store.fail_insert_log_for.lock().as_deref() == Some(full_data) {
            return Err(StorageError("injected insert_log failure".into()));
        }
        self.ops.push(Op::Log(full_data.to_vec()));
        Ok(())
    }

    fn update_block_info(&mut self, block: &Block) -> Result<(), StorageError> {
        self.ops.push(Op::BlockInfo(block.header.clone()));
        Ok(())
    }

    fn insert_into_blockchain(&mut self, block: &Block) -> Result<(), StorageError> {
        self.ops.push(Op::Chain(
            block.header.block_id,
            block.header.clone(),
            block.bin_data.clone(),
        ));
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let mut state = self.store.inner.lock();
        for op in self.ops {
            match op {
                Op::DeleteUsed { existing } => {
                    state.used.retain(|h| !existing.contains(h));
                }
                Op::MarkUsed(h) => {
                    state.used.insert(h);
                }
                Op::Status(block_id, h) => {
                    state.status.insert(h, block_id);
                }
                Op::Log(bytes) => state.log.push(bytes),
                Op::BlockInfo(header) => state.info = Some(header),
                Op::Chain(id, header, bin) => {
                    state.headers.insert(id, header);
                    state.chain.push((id, bin));
                }
            }
        }
        Ok(())
    }

    fn rollback(self: Box<Self>) {}
}

impl Storage for MemStorage {
    fn begin<'a>(&'a self) -> Result<Box<dyn StorageTx + 'a>, StorageError> {
        Ok(Box::new(MemTx {
            store: self,
            ops: Vec::new(),
        }))
    }

    fn list_all_tables(&self) -> Result<Vec<String>, StorageError> {
        Ok(self
            .inner
            .lock()
            .tables
            .iter()
            .map(|(t, _)| t.clone())
            .collect())
    }

    fn first_column(&self, table: &str) -> Result<String, StorageError> {
        self.inner
            .lock()
            .tables
            .iter()
            .find(|(t, _)| t == table)
            .map(|(_, c)| c.clone())
            .ok_or_else(|| StorageError(format!("unknown table {}", table)))
    }

    fn log_has(&self, full_data: &[u8]) -> Result<bool, StorageError> {
        Ok(self.inner.lock().log.iter().any(|e| e == full_data))
    }

    fn node_key_for(&self, wallet_id: i64, state_id: u32) -> Result<Vec<u8>, StorageError> {
        Ok(self
            .inner
            .lock()
            .node_keys
            .get(&(wallet_id, state_id))
            .cloned()
            .unwrap_or_default())
    }

    fn required_sleep(
        &self,
        _wallet_id: i64,
        _state_id: u32,
        _prev_wallet_id: i64,
        _prev_state_id: u32,
    ) -> Result<i64, StorageError> {
        Ok(self.inner.lock().sleep)
    }

    fn load_prev_header(&self, block_id: u32) -> Result<BlockHeader, StorageError> {
        self.inner
            .lock()
            .headers
            .get(&block_id)
            .cloned()
            .ok_or_else(|| StorageError(format!("no block {}", block_id)))
    }

    fn mark_tx_used_now(&self, hash: &Hash) -> Result<(), StorageError> {
        self.inner.lock().used.insert(hash.clone());
        Ok(())
    }

    fn record_bad_transaction(&self, hash: &Hash, reason: &str) -> Result<(), StorageError> {
        self.inner
            .lock()
            .bad
            .push((hash.clone(), reason.to_string()));
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SCRIPTED INTERPRETER
// ════════════════════════════════════════════════════════════════════════════

/// Interpreter stub: records every call, fails for configured authors.
#[derive(Default)]
pub struct ScriptedInterpreter {
    pub fail_authors: Mutex<HashSet<i64>>,
    pub calls: Mutex<Vec<(i64, u8)>>,
}

impl ScriptedInterpreter {
    pub fn failing_for(author: i64) -> Self {
        let s = Self::default();
        s.fail_authors.lock().insert(author);
        s
    }
}

impl ContractInterpreter for ScriptedInterpreter {
    fn call(
        &self,
        tx: &ContractTx,
        flags: CallFlags,
        _db: &mut dyn StorageTx,
    ) -> Result<(), BlockError> {
        self.calls.lock().push((tx.smart.user_id, flags.bits()));
        if self.fail_authors.lock().contains(&tx.smart.user_id) {
            return Err(BlockError::Interpreter("not enough money".into()));
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// FIRST-BLOCK HANDLER
// ════════════════════════════════════════════════════════════════════════════

struct FirstBlockHandler {
    record: FirstBlockTx,
}

impl RegularHandler for FirstBlockHandler {
    fn header(&self) -> Option<TxHeader> {
        Some(self.record.header())
    }
    fn action(&mut self, _ctx: &mut TxContext<'_>) -> Result<(), BlockError> {
        Ok(())
    }
}

fn first_block_ctor(body: &[u8]) -> Result<Box<dyn RegularHandler>, BlockError> {
    Ok(Box::new(FirstBlockHandler {
        record: FirstBlockTx::decode(body)?,
    }))
}

pub fn default_handlers() -> RegularTxRegistry {
    let mut reg = RegularTxRegistry::new();
    reg.register(TxType::FirstBlock, first_block_ctor);
    reg
}

// ════════════════════════════════════════════════════════════════════════════
// FRAME AND BLOCK BUILDERS
// ════════════════════════════════════════════════════════════════════════════

pub const TEST_CONTRACT_ID: i64 = 130;

pub fn test_contracts() -> ContractRegistry {
    use praxis_chain::{ContractField, FieldType};
    let reg = ContractRegistry::new();
    reg.register(ContractDescriptor {
        id: TEST_CONTRACT_ID,
        name: "MoneyTransfer".into(),
        fields: vec![
            ContractField::new("Amount", FieldType::Decimal, ""),
            ContractField::new("Comment", FieldType::String, ""),
        ],
    });
    reg
}

pub fn first_block_frame(time: u32) -> Vec<u8> {
    FirstBlockTx {
        tx_type: TxType::FirstBlock.tag(),
        time,
        wallet_id: 0,
        citizen_id: 0,
        public_key: vec![0x11; 32],
        node_public_key: vec![0x22; 32],
        host: "127.0.0.1".into(),
    }
    .encode()
}

pub fn contract_frame(user_id: i64, state_id: i64, time: i64, amount: &str) -> Vec<u8> {
    use praxis_chain::codec::encode_length_plus_data;

    let mut data = Vec::new();
    encode_length_plus_data(&mut data, amount.as_bytes());
    encode_length_plus_data(&mut data, b"transfer");

    let smart = SmartTx {
        tx_type: TEST_CONTRACT_ID,
        time,
        user_id,
        state_id,
        public_key: vec![0x33; 32],
        bin_signatures: vec![0x44; 64],
        data,
    };
    let mut frame = vec![TEST_CONTRACT_ID as u8];
    frame.extend_from_slice(&rmp_serde::to_vec_named(&smart).expect("msgpack"));
    frame
}

pub struct TestNode {
    pub storage: Arc<MemStorage>,
    pub interpreter: Arc<ScriptedInterpreter>,
    pub core: BlockCore,
}

pub fn build_node(interpreter: ScriptedInterpreter) -> TestNode {
    build_node_with(interpreter, SysPar::default())
}

pub fn build_node_with(interpreter: ScriptedInterpreter, syspar: SysPar) -> TestNode {
    let storage = Arc::new(MemStorage::new());
    let interpreter = Arc::new(interpreter);
    let core = BlockCore::new(
        storage.clone(),
        Arc::new(Sha3Crypto),
        Arc::new(test_contracts()),
        interpreter.clone(),
        Arc::new(default_handlers()),
        syspar,
    );
    TestNode {
        storage,
        interpreter,
        core,
    }
}

/// Marshal and insert the genesis block; returns its payload.
pub fn insert_genesis(node: &TestNode, time: i64) -> Vec<u8> {
    let header = BlockHeader {
        version: 1,
        block_id: 1,
        time,
        wallet_id: 0,
        state_id: 0,
        sign: Vec::new(),
        hash: Vec::new(),
    };
    let payload = praxis_chain::marshall_block(
        &Sha3Crypto,
        &header,
        &[first_block_frame(time as u32)],
        "",
        &[],
    )
    .expect("marshall genesis");
    node.core.insert_block(&payload).expect("insert genesis");
    payload
}

/// Marshal a signed follow-up block and register the signer's node key.
pub fn signed_block(
    node: &TestNode,
    block_id: u32,
    time: i64,
    wallet_id: i64,
    state_id: u32,
    tx_frames: &[Vec<u8>],
) -> Vec<u8> {
    let (pubkey, keypair) = praxis_chain::crypto::generate_keypair_bytes();
    node.storage.set_node_key(wallet_id, state_id, &pubkey);

    let header = BlockHeader {
        version: 1,
        block_id,
        time,
        wallet_id,
        state_id,
        sign: Vec::new(),
        hash: Vec::new(),
    };
    let prev_hash = hex::encode(node.storage.header_hash(block_id - 1));
    praxis_chain::marshall_block(&Sha3Crypto, &header, tx_frames, &prev_hash, &keypair)
        .expect("marshall block")
}

pub fn tx_hash(frame: &[u8]) -> Hash {
    Sha3Crypto.hash(frame).expect("hash")
}
