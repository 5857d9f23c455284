//! The pipeline stages, source first.

mod l1_traversal;
pub use l1_traversal::{L1RetrievalProvider, L1Traversal};

mod l1_retrieval;
pub use l1_retrieval::{FrameQueueProvider, L1Retrieval};

mod frame_queue;
pub use frame_queue::{ChannelBankProvider, FrameQueue};

mod channel_bank;
pub use channel_bank::{ChannelBank, ChannelReaderProvider, MAX_CHANNEL_BANK_SIZE};

mod channel_reader;
pub use channel_reader::{BatchQueueProvider, ChannelReader};

mod batch_queue;
pub use batch_queue::BatchQueue;

mod attributes_queue;
pub use attributes_queue::AttributesQueue;
