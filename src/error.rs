use std::io;

/// The error type used in this crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The data slice was not big enough to read the struct, or we
    /// were trying to follow an invalid offset to somewhere outside
    /// of the data bounds.
    #[error("Truncated record: {0}")]
    TruncatedRecord(#[from] ReadError),

    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Did not recognize magic value {0:?}")]
    UnrecognizedMagicValue([u8; 8]),

    /// The file header or its section table is internally inconsistent.
    #[error("Malformed header: {0}")]
    MalformedHeader(&'static str),

    #[error("Section size did not fit into usize")]
    SectionSizeTooBig,

    #[error("The specified size in the perf event header was smaller than the header itself")]
    InvalidPerfEventSize,

    /// The size of a `perf_event_attr` is implausible, for example too small
    /// to contain the `type` and `size` fields, or bigger than its container.
    #[error("Unsupported perf_event_attr size {0}")]
    UnsupportedAttributeSize(u64),

    #[error("Inconsistent CPU topology: {0}")]
    InconsistentTopology(&'static str),

    /// The sample info fields don't fit the record, or a kernel record has
    /// trailing bytes even though `sample_id_all` is not set.
    #[error("Invalid sample layout: {0}")]
    InvalidSampleLayout(&'static str),

    /// The attributes place the event id at different offsets, so records
    /// can't be matched to attributes.
    #[error("Event attributes disagree on the position of the event id")]
    InconsistentEventIdPositions,

    #[error("The event payload does not match the record type {0}")]
    MismatchedEventPayload(u32),

    #[error("Serialized record of type {record_type} would be {size} bytes, which doesn't fit into perf_event_header.size")]
    RecordTooLarge { record_type: u32, size: usize },

    #[error("Decompression failed: {0}")]
    Decompression(String),

    #[error("Could not decode the protobuf representation: {0}")]
    ProtoDecode(#[from] prost::DecodeError),
}

/// This error indicates that the data slice was not large enough to
/// read the respective item.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadError {
    #[error("Could not read PerfHeader")]
    PerfHeader,

    #[error("Could not read PerfPipeHeader")]
    PerfPipeHeader,

    #[error("Could not read FeatureSection")]
    FeatureSection,

    #[error("Could not read AttrsSection")]
    AttrsSection,

    #[error("Could not read PerfEventAttr")]
    PerfEventAttr,

    #[error("Could not read event ids")]
    EventIds,

    #[error("Could not read PerfEventHeader")]
    PerfEventHeader,

    #[error("Could not read PerfEvent data")]
    PerfEventData,

    #[error("Could not read sample info")]
    SampleInfo,

    #[error("Could not read sample id")]
    SampleId,

    #[error("Could not read read values")]
    ReadValues,

    #[error("Could not read callchain")]
    Callchain,

    #[error("Could not read branch stack")]
    BranchStack,

    #[error("Could not read register dump")]
    RegisterDump,

    #[error("Could not read stack dump")]
    StackDump,

    #[error("Could not read raw sample data")]
    RawData,

    #[error("Could not read auxtrace data")]
    AuxtraceData,

    #[error("Could not read tracing data")]
    TracingData,

    #[error("Could not read BuildIdSection")]
    BuildIdSection,

    #[error("Could not read StringLen")]
    StringLen,

    #[error("Could not read String")]
    String,

    #[error("Could not read EventDesc")]
    EventDesc,

    #[error("Could not read CpuTopology")]
    CpuTopology,

    #[error("Could not read NumaTopology")]
    NumaTopology,

    #[error("Could not read PmuMappings")]
    PmuMappings,

    #[error("Could not read GroupDesc")]
    GroupDesc,

    #[error("Could not read HybridTopology")]
    HybridTopology,
}
