pub mod core;
pub mod storage;
pub mod analysis;
pub mod document;
pub mod query;
pub mod search;
pub mod writer;
pub mod memory;

pub use crate::core::config::Config;
pub use crate::core::database::{Admission, Criterion, CriterionKind, MailIndex};
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::types::{DocId, FieldSlot};
pub use crate::search::collector::ResultSet;

/*
┌──────────────────────────────────────────────────────────────────────────────┐
│                          MAILGRAM STRUCT ARCHITECTURE                         │
└──────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────────── CORE LAYER ─────────────────────────────────┐
│  ┌──────────────────────────────────────────────────────────────────────────┐ │
│  │                            struct MailIndex                               │ │
│  │ config: Config                       // bounds, pool size, memory floor   │ │
│  │ normalizer: Arc<Normalizer>          // shared by tokenizer and queries   │ │
│  │ tokenizer: Arc<dyn Tokenizer>        // NGramTokenizer                    │ │
│  │ engine: Arc<dyn StoreEngine>         // FileStoreEngine by default        │ │
│  │ pool: WriterPool                     // bounded background writers        │ │
│  │ pending: Mutex<Vec<DocumentRecord>>  // batch being filled                │ │
│  │ reader: Mutex<Option<OpenReader>>    // reloaded when writer commits      │ │
│  │ gate: MemoryGate                     // low-memory admission              │ │
│  └──────────────────────────────────────────────────────────────────────────┘ │
└───────────────────────────────────────────────────────────────────────────────┘
                 │ index / finalize                    │ search
                 ▼                                     ▼
┌──────────── ANALYSIS / DOCUMENT ────────────┐ ┌──────────── QUERY ─────────────┐
│ Normalizer    clean, split, accent strip    │ │ QueryBuilder  criteria → tree  │
│ NGramTokenizer  partial..=full windows      │ │ QueryNode     Leaf | Branch    │
│ StemSet       sorted, unique                │ │ compile()     → NativeQuery    │
│ DocumentAssembler → DocumentRecord          │ │ render()      → log string     │
└─────────────────────────────────────────────┘ └────────────────────────────────┘
                 │ enqueue_for_write                   │
                 ▼                                     ▼
┌──────────────── WRITER ─────────────────────┐ ┌──────────── SEARCH ────────────┐
│ WriterPool    [SlotState; max_threads]      │ │ ResultCollector  paged, newest │
│               Condvar on slot release       │ │                  handle first  │
│ SharedWriter  Mutex<Option<WritableStore>>  │ │ ResultSet        Vec<DocId>    │
└─────────────────────────────────────────────┘ └────────────────────────────────┘
                 │                                     │
                 ▼                                     ▼
┌────────────────────────────────── STORAGE ────────────────────────────────────┐
│ trait StoreEngine / WritableStore / ReadableStore                             │
│ FileStoreEngine   terms.db = MGTS | version | crc32 | lz4(bincode(Snapshot))  │
│                   RoaringBitmap postings per prefixed term                    │
│ FileLock          flock(.lock), one writer per directory                      │
└───────────────────────────────────────────────────────────────────────────────┘
*/
