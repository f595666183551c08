//! The structured representation of a perf.data file.
//!
//! These are protobuf messages, so a parsed file can be persisted with
//! [`prost::Message::encode_to_vec`] and loaded again with
//! [`prost::Message::decode`]. Optional sample fields are explicit
//! `Option`s, so it's observable whether a field was present in the input.

use prost_derive::{Message, Oneof};

/// A complete perf.data file.
#[derive(Clone, PartialEq, Message)]
pub struct PerfDataProto {
    #[prost(message, repeated, tag = "1")]
    pub file_attrs: Vec<PerfFileAttr>,
    #[prost(message, repeated, tag = "2")]
    pub events: Vec<PerfEvent>,
    #[prost(message, repeated, tag = "3")]
    pub event_types: Vec<PerfEventType>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub tracing_data: Option<Vec<u8>>,
    #[prost(message, repeated, tag = "5")]
    pub build_ids: Vec<BuildIdEntry>,
    #[prost(message, optional, tag = "6")]
    pub string_metadata: Option<StringMetadata>,
    #[prost(message, repeated, tag = "7")]
    pub uint32_metadata: Vec<Uint32Metadata>,
    #[prost(message, repeated, tag = "8")]
    pub uint64_metadata: Vec<Uint64Metadata>,
    #[prost(message, optional, tag = "9")]
    pub cpu_topology: Option<CpuTopology>,
    #[prost(message, repeated, tag = "10")]
    pub numa_topology: Vec<NumaNode>,
    #[prost(message, repeated, tag = "11")]
    pub pmu_mappings: Vec<PmuMapping>,
    #[prost(message, repeated, tag = "12")]
    pub group_desc: Vec<GroupDesc>,
    #[prost(message, repeated, tag = "13")]
    pub hybrid_topology: Vec<HybridTopologyPmu>,
    /// Feature sections which are carried through without interpretation.
    #[prost(message, repeated, tag = "14")]
    pub opaque_features: Vec<OpaqueFeature>,
    /// The `adds_features` bitmask, four u64 words.
    #[prost(uint64, repeated, tag = "15")]
    pub metadata_mask: Vec<u64>,
    #[prost(message, optional, tag = "16")]
    pub stats: Option<PerfEventStats>,
}

/// A `perf_event_attr` together with the ids of the events that use it.
#[derive(Clone, PartialEq, Message)]
pub struct PerfFileAttr {
    #[prost(message, optional, tag = "1")]
    pub attr: Option<PerfEventAttr>,
    #[prost(uint64, repeated, tag = "2")]
    pub ids: Vec<u64>,
}

/// `perf_event_attr`, up to `PERF_ATTR_SIZE_VER8`.
#[derive(Clone, PartialEq, Message)]
pub struct PerfEventAttr {
    #[prost(uint32, tag = "1")]
    pub r#type: u32,
    /// The size recorded in the struct, which may differ from the size of
    /// the layout known to this crate.
    #[prost(uint32, tag = "2")]
    pub size: u32,
    #[prost(uint64, tag = "3")]
    pub config: u64,
    /// Set if `freq` is false.
    #[prost(uint64, optional, tag = "4")]
    pub sample_period: Option<u64>,
    /// Set if `freq` is true.
    #[prost(uint64, optional, tag = "5")]
    pub sample_freq: Option<u64>,
    #[prost(uint64, tag = "6")]
    pub sample_type: u64,
    #[prost(uint64, tag = "7")]
    pub read_format: u64,
    #[prost(bool, tag = "8")]
    pub disabled: bool,
    #[prost(bool, tag = "9")]
    pub inherit: bool,
    #[prost(bool, tag = "10")]
    pub pinned: bool,
    #[prost(bool, tag = "11")]
    pub exclusive: bool,
    #[prost(bool, tag = "12")]
    pub exclude_user: bool,
    #[prost(bool, tag = "13")]
    pub exclude_kernel: bool,
    #[prost(bool, tag = "14")]
    pub exclude_hv: bool,
    #[prost(bool, tag = "15")]
    pub exclude_idle: bool,
    #[prost(bool, tag = "16")]
    pub mmap: bool,
    #[prost(bool, tag = "17")]
    pub comm: bool,
    #[prost(bool, tag = "18")]
    pub freq: bool,
    #[prost(bool, tag = "19")]
    pub inherit_stat: bool,
    #[prost(bool, tag = "20")]
    pub enable_on_exec: bool,
    #[prost(bool, tag = "21")]
    pub task: bool,
    #[prost(bool, tag = "22")]
    pub watermark: bool,
    /// Two-bit skid constraint.
    #[prost(uint32, tag = "23")]
    pub precise_ip: u32,
    #[prost(bool, tag = "24")]
    pub mmap_data: bool,
    #[prost(bool, tag = "25")]
    pub sample_id_all: bool,
    #[prost(bool, tag = "26")]
    pub exclude_host: bool,
    #[prost(bool, tag = "27")]
    pub exclude_guest: bool,
    #[prost(bool, tag = "28")]
    pub exclude_callchain_kernel: bool,
    #[prost(bool, tag = "29")]
    pub exclude_callchain_user: bool,
    #[prost(bool, tag = "30")]
    pub mmap2: bool,
    #[prost(bool, tag = "31")]
    pub comm_exec: bool,
    #[prost(bool, tag = "32")]
    pub use_clockid: bool,
    #[prost(bool, tag = "33")]
    pub context_switch: bool,
    #[prost(bool, tag = "34")]
    pub write_backward: bool,
    #[prost(bool, tag = "35")]
    pub namespaces: bool,
    #[prost(bool, tag = "36")]
    pub ksymbol: bool,
    #[prost(bool, tag = "37")]
    pub bpf_event: bool,
    #[prost(bool, tag = "38")]
    pub aux_output: bool,
    #[prost(bool, tag = "39")]
    pub cgroup: bool,
    #[prost(bool, tag = "40")]
    pub text_poke: bool,
    #[prost(bool, tag = "41")]
    pub build_id: bool,
    #[prost(bool, tag = "42")]
    pub inherit_thread: bool,
    #[prost(bool, tag = "43")]
    pub remove_on_exec: bool,
    #[prost(bool, tag = "44")]
    pub sigtrap: bool,
    /// Flag bits without a name yet, at their canonical bit positions.
    #[prost(uint64, tag = "45")]
    pub reserved_flag_bits: u64,
    /// Set if `watermark` is false.
    #[prost(uint32, optional, tag = "46")]
    pub wakeup_events: Option<u32>,
    /// Set if `watermark` is true.
    #[prost(uint32, optional, tag = "47")]
    pub wakeup_watermark: Option<u32>,
    #[prost(uint32, tag = "48")]
    pub bp_type: u32,
    /// Also `bp_addr`, `kprobe_func`, `uprobe_path`.
    #[prost(uint64, tag = "49")]
    pub config1: u64,
    /// Also `bp_len`, `kprobe_addr`, `probe_offset`.
    #[prost(uint64, tag = "50")]
    pub config2: u64,
    #[prost(uint64, tag = "51")]
    pub branch_sample_type: u64,
    #[prost(uint64, tag = "52")]
    pub sample_regs_user: u64,
    #[prost(uint32, tag = "53")]
    pub sample_stack_user: u32,
    #[prost(int32, tag = "54")]
    pub clockid: i32,
    #[prost(uint64, tag = "55")]
    pub sample_regs_intr: u64,
    #[prost(uint32, tag = "56")]
    pub aux_watermark: u32,
    #[prost(uint32, tag = "57")]
    pub sample_max_stack: u32,
    #[prost(uint32, tag = "58")]
    pub aux_sample_size: u32,
    #[prost(uint64, tag = "59")]
    pub sig_data: u64,
    #[prost(uint64, tag = "60")]
    pub config3: u64,
}

/// An event name, from `PERF_RECORD_HEADER_EVENT_TYPE` or `HEADER_EVENT_DESC`.
#[derive(Clone, PartialEq, Message)]
pub struct PerfEventType {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(string, tag = "2")]
    pub name: String,
}

/// `perf_event_header`
#[derive(Clone, Copy, PartialEq, Message)]
pub struct EventHeader {
    #[prost(uint32, tag = "1")]
    pub r#type: u32,
    #[prost(uint32, tag = "2")]
    pub misc: u32,
    #[prost(uint32, tag = "3")]
    pub size: u32,
}

/// One record from the data section.
#[derive(Clone, PartialEq, Message)]
pub struct PerfEvent {
    #[prost(message, optional, tag = "1")]
    pub header: Option<EventHeader>,
    #[prost(
        oneof = "PerfEventPayload",
        tags = "2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28"
    )]
    pub event: Option<PerfEventPayload>,
    /// The sample time of the record, if its layout contains one.
    #[prost(uint64, optional, tag = "40")]
    pub timestamp: Option<u64>,
}

#[derive(Clone, PartialEq, Oneof)]
pub enum PerfEventPayload {
    /// `PERF_RECORD_MMAP` and `PERF_RECORD_MMAP2`
    #[prost(message, tag = "2")]
    Mmap(MmapEvent),
    #[prost(message, tag = "3")]
    Sample(SampleEvent),
    #[prost(message, tag = "4")]
    Comm(CommEvent),
    #[prost(message, tag = "5")]
    Fork(ForkEvent),
    #[prost(message, tag = "6")]
    Exit(ForkEvent),
    #[prost(message, tag = "7")]
    Lost(LostEvent),
    /// `PERF_RECORD_THROTTLE` and `PERF_RECORD_UNTHROTTLE`
    #[prost(message, tag = "8")]
    Throttle(ThrottleEvent),
    #[prost(message, tag = "9")]
    Read(ReadEvent),
    #[prost(message, tag = "10")]
    Aux(AuxEvent),
    #[prost(message, tag = "11")]
    ItraceStart(ItraceStartEvent),
    #[prost(message, tag = "12")]
    LostSamples(LostSamplesEvent),
    /// `PERF_RECORD_SWITCH` and `PERF_RECORD_SWITCH_CPU_WIDE`
    #[prost(message, tag = "13")]
    ContextSwitch(ContextSwitchEvent),
    #[prost(message, tag = "14")]
    Namespaces(NamespacesEvent),
    #[prost(message, tag = "15")]
    Ksymbol(KsymbolEvent),
    #[prost(message, tag = "16")]
    Bpf(BpfEvent),
    #[prost(message, tag = "17")]
    Cgroup(CgroupEvent),
    #[prost(message, tag = "18")]
    TextPoke(TextPokeEvent),
    #[prost(message, tag = "19")]
    AuxtraceInfo(AuxtraceInfoEvent),
    #[prost(message, tag = "20")]
    Auxtrace(AuxtraceEvent),
    #[prost(message, tag = "21")]
    AuxtraceError(AuxtraceErrorEvent),
    #[prost(message, tag = "22")]
    IdIndex(IdIndexEvent),
    #[prost(message, tag = "23")]
    ThreadMap(ThreadMapEvent),
    #[prost(message, tag = "24")]
    StatConfig(StatConfigEvent),
    #[prost(message, tag = "25")]
    Stat(StatEvent),
    #[prost(message, tag = "26")]
    StatRound(StatRoundEvent),
    #[prost(message, tag = "27")]
    TimeConv(TimeConvEvent),
    #[prost(message, tag = "28")]
    FinishedRound(FinishedRoundEvent),
}

/// The sample id fields which trail non-sample kernel records when
/// `sample_id_all` is set.
#[derive(Clone, Copy, PartialEq, Message)]
pub struct SampleInfo {
    #[prost(uint32, optional, tag = "1")]
    pub pid: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    pub tid: Option<u32>,
    #[prost(uint64, optional, tag = "3")]
    pub sample_time_ns: Option<u64>,
    /// `PERF_SAMPLE_ID` or `PERF_SAMPLE_IDENTIFIER`
    #[prost(uint64, optional, tag = "4")]
    pub id: Option<u64>,
    #[prost(uint64, optional, tag = "5")]
    pub stream_id: Option<u64>,
    #[prost(uint32, optional, tag = "6")]
    pub cpu: Option<u32>,
}

#[derive(Clone, Copy, PartialEq, Message)]
pub struct MmapDevice {
    #[prost(uint32, tag = "1")]
    pub maj: u32,
    #[prost(uint32, tag = "2")]
    pub min: u32,
    #[prost(uint64, tag = "3")]
    pub ino: u64,
    #[prost(uint64, tag = "4")]
    pub ino_generation: u64,
}

/// The union in `PERF_RECORD_MMAP2`, selected by
/// `PERF_RECORD_MISC_MMAP_BUILD_ID`.
#[derive(Clone, PartialEq, Oneof)]
pub enum MmapFileId {
    #[prost(message, tag = "6")]
    Device(MmapDevice),
    #[prost(bytes = "vec", tag = "7")]
    BuildId(Vec<u8>),
}

#[derive(Clone, PartialEq, Message)]
pub struct MmapEvent {
    #[prost(uint32, tag = "1")]
    pub pid: u32,
    #[prost(uint32, tag = "2")]
    pub tid: u32,
    #[prost(uint64, tag = "3")]
    pub start: u64,
    #[prost(uint64, tag = "4")]
    pub len: u64,
    #[prost(uint64, tag = "5")]
    pub pgoff: u64,
    /// Only present for `PERF_RECORD_MMAP2`.
    #[prost(oneof = "MmapFileId", tags = "6, 7")]
    pub file_id: Option<MmapFileId>,
    #[prost(uint32, optional, tag = "8")]
    pub prot: Option<u32>,
    #[prost(uint32, optional, tag = "9")]
    pub flags: Option<u32>,
    #[prost(string, tag = "10")]
    pub filename: String,
    #[prost(message, optional, tag = "11")]
    pub sample_info: Option<SampleInfo>,
}

#[derive(Clone, PartialEq, Message)]
pub struct CommEvent {
    #[prost(uint32, tag = "1")]
    pub pid: u32,
    #[prost(uint32, tag = "2")]
    pub tid: u32,
    #[prost(string, tag = "3")]
    pub comm: String,
    #[prost(message, optional, tag = "4")]
    pub sample_info: Option<SampleInfo>,
}

/// `PERF_RECORD_FORK` and `PERF_RECORD_EXIT`
#[derive(Clone, PartialEq, Message)]
pub struct ForkEvent {
    #[prost(uint32, tag = "1")]
    pub pid: u32,
    #[prost(uint32, tag = "2")]
    pub ppid: u32,
    #[prost(uint32, tag = "3")]
    pub tid: u32,
    #[prost(uint32, tag = "4")]
    pub ptid: u32,
    #[prost(uint64, tag = "5")]
    pub fork_time_ns: u64,
    #[prost(message, optional, tag = "6")]
    pub sample_info: Option<SampleInfo>,
}

#[derive(Clone, PartialEq, Message)]
pub struct LostEvent {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(uint64, tag = "2")]
    pub lost: u64,
    #[prost(message, optional, tag = "3")]
    pub sample_info: Option<SampleInfo>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ThrottleEvent {
    #[prost(uint64, tag = "1")]
    pub time_ns: u64,
    #[prost(uint64, tag = "2")]
    pub id: u64,
    #[prost(uint64, tag = "3")]
    pub stream_id: u64,
    #[prost(message, optional, tag = "4")]
    pub sample_info: Option<SampleInfo>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ReadValue {
    #[prost(uint64, tag = "1")]
    pub value: u64,
    #[prost(uint64, optional, tag = "2")]
    pub id: Option<u64>,
    #[prost(uint64, optional, tag = "3")]
    pub lost: Option<u64>,
}

/// Counter values laid out according to `read_format`.
#[derive(Clone, PartialEq, Message)]
pub struct ReadInfo {
    #[prost(uint64, optional, tag = "1")]
    pub time_enabled: Option<u64>,
    #[prost(uint64, optional, tag = "2")]
    pub time_running: Option<u64>,
    /// Exactly one value unless `PERF_FORMAT_GROUP` is set.
    #[prost(message, repeated, tag = "3")]
    pub values: Vec<ReadValue>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ReadEvent {
    #[prost(uint32, tag = "1")]
    pub pid: u32,
    #[prost(uint32, tag = "2")]
    pub tid: u32,
    #[prost(message, optional, tag = "3")]
    pub read_info: Option<ReadInfo>,
    #[prost(message, optional, tag = "4")]
    pub sample_info: Option<SampleInfo>,
}

/// `perf_branch_entry`
#[derive(Clone, Copy, PartialEq, Message)]
pub struct BranchStackEntry {
    #[prost(uint64, tag = "1")]
    pub from_ip: u64,
    #[prost(uint64, tag = "2")]
    pub to_ip: u64,
    #[prost(bool, tag = "3")]
    pub mispredicted: bool,
    #[prost(bool, tag = "4")]
    pub predicted: bool,
    #[prost(bool, tag = "5")]
    pub in_transaction: bool,
    #[prost(bool, tag = "6")]
    pub abort: bool,
    #[prost(uint32, tag = "7")]
    pub cycles: u32,
    #[prost(uint32, tag = "8")]
    pub r#type: u32,
    #[prost(uint32, tag = "9")]
    pub spec: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct RegisterDump {
    #[prost(uint64, tag = "1")]
    pub abi: u64,
    /// Empty if `abi` is `PERF_SAMPLE_REGS_ABI_NONE`.
    #[prost(uint64, repeated, tag = "2")]
    pub regs: Vec<u64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct StackDump {
    #[prost(bytes = "vec", tag = "1")]
    pub data: Vec<u8>,
    /// Only written if `data` is non-empty.
    #[prost(uint64, tag = "2")]
    pub dyn_size: u64,
}

/// `PERF_SAMPLE_WEIGHT_STRUCT`
#[derive(Clone, Copy, PartialEq, Message)]
pub struct WeightStruct {
    #[prost(uint32, tag = "1")]
    pub var1_dw: u32,
    #[prost(uint32, tag = "2")]
    pub var2_w: u32,
    #[prost(uint32, tag = "3")]
    pub var3_w: u32,
}

/// `PERF_RECORD_SAMPLE`. Which fields are present is decided by the
/// attribute's `sample_type`.
#[derive(Clone, PartialEq, Message)]
pub struct SampleEvent {
    #[prost(uint64, optional, tag = "1")]
    pub ip: Option<u64>,
    #[prost(uint32, optional, tag = "2")]
    pub pid: Option<u32>,
    #[prost(uint32, optional, tag = "3")]
    pub tid: Option<u32>,
    #[prost(uint64, optional, tag = "4")]
    pub sample_time_ns: Option<u64>,
    #[prost(uint64, optional, tag = "5")]
    pub addr: Option<u64>,
    /// `PERF_SAMPLE_ID` or `PERF_SAMPLE_IDENTIFIER`
    #[prost(uint64, optional, tag = "6")]
    pub id: Option<u64>,
    #[prost(uint64, optional, tag = "7")]
    pub stream_id: Option<u64>,
    #[prost(uint32, optional, tag = "8")]
    pub cpu: Option<u32>,
    #[prost(uint64, optional, tag = "9")]
    pub period: Option<u64>,
    #[prost(message, optional, tag = "10")]
    pub read_info: Option<ReadInfo>,
    #[prost(uint64, repeated, tag = "11")]
    pub callchain: Vec<u64>,
    #[prost(bytes = "vec", optional, tag = "12")]
    pub raw: Option<Vec<u8>>,
    #[prost(uint64, optional, tag = "13")]
    pub branch_stack_hw_idx: Option<u64>,
    #[prost(message, repeated, tag = "14")]
    pub branch_stack: Vec<BranchStackEntry>,
    #[prost(message, optional, tag = "15")]
    pub regs_user: Option<RegisterDump>,
    #[prost(message, optional, tag = "16")]
    pub stack_user: Option<StackDump>,
    #[prost(uint64, optional, tag = "17")]
    pub weight: Option<u64>,
    #[prost(message, optional, tag = "18")]
    pub weight_struct: Option<WeightStruct>,
    #[prost(uint64, optional, tag = "19")]
    pub data_src: Option<u64>,
    #[prost(uint64, optional, tag = "20")]
    pub transaction: Option<u64>,
    #[prost(message, optional, tag = "21")]
    pub regs_intr: Option<RegisterDump>,
    #[prost(uint64, optional, tag = "22")]
    pub phys_addr: Option<u64>,
    #[prost(bytes = "vec", optional, tag = "23")]
    pub aux: Option<Vec<u8>>,
    #[prost(uint64, optional, tag = "24")]
    pub cgroup: Option<u64>,
    #[prost(uint64, optional, tag = "25")]
    pub data_page_size: Option<u64>,
    #[prost(uint64, optional, tag = "26")]
    pub code_page_size: Option<u64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AuxEvent {
    #[prost(uint64, tag = "1")]
    pub aux_offset: u64,
    #[prost(uint64, tag = "2")]
    pub aux_size: u64,
    #[prost(bool, tag = "3")]
    pub is_truncated: bool,
    #[prost(bool, tag = "4")]
    pub is_overwrite: bool,
    #[prost(bool, tag = "5")]
    pub is_partial: bool,
    /// Flag bits other than the three above.
    #[prost(uint64, tag = "6")]
    pub other_flags: u64,
    #[prost(message, optional, tag = "7")]
    pub sample_info: Option<SampleInfo>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ItraceStartEvent {
    #[prost(uint32, tag = "1")]
    pub pid: u32,
    #[prost(uint32, tag = "2")]
    pub tid: u32,
    #[prost(message, optional, tag = "3")]
    pub sample_info: Option<SampleInfo>,
}

#[derive(Clone, PartialEq, Message)]
pub struct LostSamplesEvent {
    #[prost(uint64, tag = "1")]
    pub num_lost: u64,
    #[prost(message, optional, tag = "2")]
    pub sample_info: Option<SampleInfo>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ContextSwitchEvent {
    /// Derived from `PERF_RECORD_MISC_SWITCH_OUT`.
    #[prost(bool, tag = "1")]
    pub is_out: bool,
    /// Derived from `PERF_RECORD_MISC_SWITCH_OUT_PREEMPT`.
    #[prost(bool, tag = "2")]
    pub is_out_preempt: bool,
    /// Only present for `PERF_RECORD_SWITCH_CPU_WIDE`.
    #[prost(uint32, optional, tag = "3")]
    pub next_prev_pid: Option<u32>,
    #[prost(uint32, optional, tag = "4")]
    pub next_prev_tid: Option<u32>,
    #[prost(message, optional, tag = "5")]
    pub sample_info: Option<SampleInfo>,
}

#[derive(Clone, Copy, PartialEq, Message)]
pub struct NamespaceLinkInfo {
    #[prost(uint64, tag = "1")]
    pub dev: u64,
    #[prost(uint64, tag = "2")]
    pub ino: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct NamespacesEvent {
    #[prost(uint32, tag = "1")]
    pub pid: u32,
    #[prost(uint32, tag = "2")]
    pub tid: u32,
    #[prost(message, repeated, tag = "3")]
    pub link_info: Vec<NamespaceLinkInfo>,
    #[prost(message, optional, tag = "4")]
    pub sample_info: Option<SampleInfo>,
}

#[derive(Clone, PartialEq, Message)]
pub struct KsymbolEvent {
    #[prost(uint64, tag = "1")]
    pub addr: u64,
    #[prost(uint32, tag = "2")]
    pub len: u32,
    #[prost(uint32, tag = "3")]
    pub ksym_type: u32,
    #[prost(uint32, tag = "4")]
    pub flags: u32,
    #[prost(string, tag = "5")]
    pub name: String,
    #[prost(message, optional, tag = "6")]
    pub sample_info: Option<SampleInfo>,
}

#[derive(Clone, PartialEq, Message)]
pub struct BpfEvent {
    #[prost(uint32, tag = "1")]
    pub r#type: u32,
    #[prost(uint32, tag = "2")]
    pub flags: u32,
    #[prost(uint32, tag = "3")]
    pub id: u32,
    /// `BPF_TAG_SIZE` bytes.
    #[prost(bytes = "vec", tag = "4")]
    pub tag: Vec<u8>,
    #[prost(message, optional, tag = "5")]
    pub sample_info: Option<SampleInfo>,
}

#[derive(Clone, PartialEq, Message)]
pub struct CgroupEvent {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(string, tag = "2")]
    pub path: String,
    #[prost(message, optional, tag = "3")]
    pub sample_info: Option<SampleInfo>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TextPokeEvent {
    #[prost(uint64, tag = "1")]
    pub addr: u64,
    #[prost(uint32, tag = "2")]
    pub old_len: u32,
    #[prost(uint32, tag = "3")]
    pub new_len: u32,
    /// The old bytes followed by the new bytes.
    #[prost(bytes = "vec", tag = "4")]
    pub bytes: Vec<u8>,
    #[prost(message, optional, tag = "5")]
    pub sample_info: Option<SampleInfo>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AuxtraceInfoEvent {
    #[prost(uint32, tag = "1")]
    pub r#type: u32,
    #[prost(uint64, repeated, tag = "2")]
    pub priv_data: Vec<u64>,
}

/// `PERF_RECORD_AUXTRACE`. The trace data follows the record in the file
/// and is not counted in `header.size`.
#[derive(Clone, PartialEq, Message)]
pub struct AuxtraceEvent {
    #[prost(uint64, tag = "1")]
    pub size: u64,
    #[prost(uint64, tag = "2")]
    pub offset: u64,
    #[prost(uint64, tag = "3")]
    pub reference: u64,
    #[prost(uint32, tag = "4")]
    pub idx: u32,
    #[prost(uint32, tag = "5")]
    pub tid: u32,
    #[prost(uint32, tag = "6")]
    pub cpu: u32,
    #[prost(bytes = "vec", tag = "7")]
    pub trace_data: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AuxtraceErrorEvent {
    #[prost(uint32, tag = "1")]
    pub r#type: u32,
    #[prost(uint32, tag = "2")]
    pub code: u32,
    #[prost(uint32, tag = "3")]
    pub cpu: u32,
    #[prost(uint32, tag = "4")]
    pub pid: u32,
    #[prost(uint32, tag = "5")]
    pub tid: u32,
    #[prost(uint64, tag = "6")]
    pub ip: u64,
    #[prost(string, tag = "7")]
    pub msg: String,
}

#[derive(Clone, Copy, PartialEq, Message)]
pub struct IdIndexEntry {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(uint64, tag = "2")]
    pub idx: u64,
    #[prost(uint64, tag = "3")]
    pub cpu: u64,
    #[prost(uint64, tag = "4")]
    pub tid: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct IdIndexEvent {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<IdIndexEntry>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ThreadMapEntry {
    #[prost(uint64, tag = "1")]
    pub pid: u64,
    #[prost(string, tag = "2")]
    pub comm: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct ThreadMapEvent {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<ThreadMapEntry>,
}

#[derive(Clone, Copy, PartialEq, Message)]
pub struct StatConfigEntry {
    #[prost(uint64, tag = "1")]
    pub tag: u64,
    #[prost(uint64, tag = "2")]
    pub val: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct StatConfigEvent {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<StatConfigEntry>,
}

#[derive(Clone, PartialEq, Message)]
pub struct StatEvent {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(uint32, tag = "2")]
    pub cpu: u32,
    #[prost(uint32, tag = "3")]
    pub thread: u32,
    #[prost(uint64, tag = "4")]
    pub value: u64,
    #[prost(uint64, tag = "5")]
    pub enabled: u64,
    #[prost(uint64, tag = "6")]
    pub running: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct StatRoundEvent {
    #[prost(uint64, tag = "1")]
    pub r#type: u64,
    #[prost(uint64, tag = "2")]
    pub time: u64,
}

/// `PERF_RECORD_TIME_CONV`. Older perf versions write only the first three
/// fields.
#[derive(Clone, PartialEq, Message)]
pub struct TimeConvEvent {
    #[prost(uint64, tag = "1")]
    pub time_shift: u64,
    #[prost(uint64, tag = "2")]
    pub time_mult: u64,
    #[prost(uint64, tag = "3")]
    pub time_zero: u64,
    #[prost(uint64, optional, tag = "4")]
    pub time_cycles: Option<u64>,
    #[prost(uint64, optional, tag = "5")]
    pub time_mask: Option<u64>,
    #[prost(bool, optional, tag = "6")]
    pub cap_user_time_zero: Option<bool>,
    #[prost(bool, optional, tag = "7")]
    pub cap_user_time_short: Option<bool>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FinishedRoundEvent {}

/// A build id for one binary.
#[derive(Clone, PartialEq, Message)]
pub struct BuildIdEntry {
    /// `header.misc` without `PERF_RECORD_MISC_BUILD_ID_SIZE`.
    #[prost(uint32, tag = "1")]
    pub misc: u32,
    #[prost(int32, tag = "2")]
    pub pid: i32,
    /// At most 20 bytes.
    #[prost(bytes = "vec", tag = "3")]
    pub build_id: Vec<u8>,
    #[prost(string, tag = "4")]
    pub filename: String,
}

/// The string-valued feature sections.
#[derive(Clone, PartialEq, Message)]
pub struct StringMetadata {
    /// `HEADER_HOSTNAME`
    #[prost(string, optional, tag = "1")]
    pub hostname: Option<String>,
    /// `HEADER_OSRELEASE`
    #[prost(string, optional, tag = "2")]
    pub kernel_version: Option<String>,
    /// `HEADER_VERSION`
    #[prost(string, optional, tag = "3")]
    pub perf_version: Option<String>,
    /// `HEADER_ARCH`
    #[prost(string, optional, tag = "4")]
    pub architecture: Option<String>,
    /// `HEADER_CPUDESC`
    #[prost(string, optional, tag = "5")]
    pub cpu_description: Option<String>,
    /// `HEADER_CPUID`
    #[prost(string, optional, tag = "6")]
    pub cpu_id: Option<String>,
    /// `HEADER_CMDLINE`, one entry per argument.
    #[prost(string, repeated, tag = "7")]
    pub perf_command_line_tokens: Vec<String>,
    /// `HEADER_CMDLINE`, joined with spaces.
    #[prost(string, optional, tag = "8")]
    pub perf_command_line_whole: Option<String>,
}

/// A feature section made of u32 values, e.g. `HEADER_NRCPUS`.
#[derive(Clone, PartialEq, Message)]
pub struct Uint32Metadata {
    #[prost(uint32, tag = "1")]
    pub r#type: u32,
    #[prost(uint32, repeated, tag = "2")]
    pub data: Vec<u32>,
}

/// A feature section made of u64 values, e.g. `HEADER_TOTAL_MEM`.
#[derive(Clone, PartialEq, Message)]
pub struct Uint64Metadata {
    #[prost(uint32, tag = "1")]
    pub r#type: u32,
    #[prost(uint64, repeated, tag = "2")]
    pub data: Vec<u64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct CpuTopology {
    #[prost(string, repeated, tag = "1")]
    pub core_siblings: Vec<String>,
    #[prost(string, repeated, tag = "2")]
    pub thread_siblings: Vec<String>,
    /// Per-CPU core and socket ids, die and cluster lists of newer perf
    /// versions, carried over verbatim.
    #[prost(bytes = "vec", tag = "3")]
    pub trailing_data: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct NumaNode {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(uint64, tag = "2")]
    pub total_memory: u64,
    #[prost(uint64, tag = "3")]
    pub free_memory: u64,
    #[prost(string, tag = "4")]
    pub cpu_list: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct PmuMapping {
    #[prost(uint32, tag = "1")]
    pub r#type: u32,
    #[prost(string, tag = "2")]
    pub name: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct GroupDesc {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(uint32, tag = "2")]
    pub leader_idx: u32,
    #[prost(uint32, tag = "3")]
    pub num_members: u32,
}

/// One PMU of a hybrid system, e.g. `cpu_core` or `cpu_atom`.
#[derive(Clone, PartialEq, Message)]
pub struct HybridTopologyPmu {
    #[prost(string, tag = "1")]
    pub pmu_name: String,
    /// The cpu list as written by perf, e.g. `"0-3,8"`.
    #[prost(string, tag = "2")]
    pub cpus: String,
    /// `cpus`, expanded.
    #[prost(uint32, repeated, tag = "3")]
    pub cpu_list: Vec<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct OpaqueFeature {
    #[prost(uint32, tag = "1")]
    pub feature: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
}

/// Counters collected while reading a file.
#[derive(Clone, Copy, PartialEq, Message)]
pub struct PerfEventStats {
    #[prost(uint64, tag = "1")]
    pub num_events_read: u64,
    #[prost(uint64, tag = "2")]
    pub num_sample_events: u64,
    #[prost(uint64, tag = "3")]
    pub num_mmap_events: u64,
    #[prost(uint64, tag = "4")]
    pub num_comm_events: u64,
    #[prost(uint64, tag = "5")]
    pub num_fork_events: u64,
    #[prost(uint64, tag = "6")]
    pub num_exit_events: u64,
    /// Records of a type this crate doesn't know.
    #[prost(uint64, tag = "7")]
    pub num_unknown_events_skipped: u64,
    /// Records dropped because their type is in the skip set.
    #[prost(uint64, tag = "8")]
    pub num_filtered_events: u64,
    /// Records whose `header.size` disagrees with the size computed from
    /// their contents.
    #[prost(uint64, tag = "9")]
    pub num_size_mismatches: u64,
    /// Incomplete or invalid mmap records which were dropped.
    #[prost(uint64, tag = "10")]
    pub num_mmaps_skipped: u64,
    #[prost(uint64, tag = "11")]
    pub num_compressed_events: u64,
    /// Feature sections with a bit this crate doesn't know.
    #[prost(uint64, tag = "12")]
    pub num_unknown_features_skipped: u64,
}
