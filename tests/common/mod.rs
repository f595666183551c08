//! Builders for synthetic perf.data images, flat and piped, in either byte
//! order.

#![allow(dead_code)]

use std::marker::PhantomData;

use byteorder::{ByteOrder, LittleEndian};
use perf_data_codec::constants::*;
use perf_data_codec::features::*;
use perf_data_codec::proto::PerfEventAttr;
use perf_data_codec::{write_perf_event_attr, ByteWriter, PERF_EVENT_ATTR_SIZE};

/// The sample type used by most tests. Kernel records carry a 32 byte
/// sample id suffix: pid/tid, time, cpu, identifier.
pub const SAMPLE_TYPE: u64 = PERF_SAMPLE_IDENTIFIER
    | PERF_SAMPLE_IP
    | PERF_SAMPLE_TID
    | PERF_SAMPLE_TIME
    | PERF_SAMPLE_CPU
    | PERF_SAMPLE_PERIOD
    | PERF_SAMPLE_CALLCHAIN;

pub fn attr(config: u64) -> PerfEventAttr {
    PerfEventAttr {
        r#type: 0,
        size: PERF_EVENT_ATTR_SIZE as u32,
        config,
        sample_period: Some(4000),
        sample_type: SAMPLE_TYPE,
        sample_id_all: true,
        exclude_kernel: true,
        disabled: true,
        wakeup_events: Some(0),
        ..Default::default()
    }
}

pub fn attr_bytes<T: ByteOrder>(attr: &PerfEventAttr) -> Vec<u8> {
    let mut writer = ByteWriter::new();
    write_perf_event_attr::<T>(attr, &mut writer);
    writer.into_inner()
}

/// A chained little byte builder.
pub struct Bytes<T> {
    data: Vec<u8>,
    _order: PhantomData<T>,
}

impl<T: ByteOrder> Default for Bytes<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ByteOrder> Bytes<T> {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            _order: PhantomData,
        }
    }

    pub fn u8(mut self, value: u8) -> Self {
        self.data.push(value);
        self
    }

    pub fn u16(mut self, value: u16) -> Self {
        let mut buf = [0; 2];
        T::write_u16(&mut buf, value);
        self.data.extend_from_slice(&buf);
        self
    }

    pub fn u32(mut self, value: u32) -> Self {
        let mut buf = [0; 4];
        T::write_u32(&mut buf, value);
        self.data.extend_from_slice(&buf);
        self
    }

    pub fn u64(mut self, value: u64) -> Self {
        let mut buf = [0; 8];
        T::write_u64(&mut buf, value);
        self.data.extend_from_slice(&buf);
        self
    }

    pub fn bytes(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    /// A NUL-terminated string, padded to a multiple of 8 bytes.
    pub fn record_string(mut self, s: &str) -> Self {
        let len = (s.len() + 1).div_ceil(8) * 8;
        self.data.extend_from_slice(s.as_bytes());
        self.data.resize(self.data.len() + len - s.len(), 0);
        self
    }

    /// A `perf_header_string` padded to 64 bytes.
    pub fn header_string(self, s: &str) -> Self {
        let len = (s.len() + 1).div_ceil(64) * 64;
        let mut padded = s.as_bytes().to_vec();
        padded.resize(len, 0);
        self.u32(len as u32).bytes(&padded)
    }

    /// The sample id suffix for [`SAMPLE_TYPE`].
    pub fn sample_id(self, pid: u32, tid: u32, time: u64, cpu: u32, id: u64) -> Self {
        self.u32(pid).u32(tid).u64(time).u32(cpu).u32(0).u64(id)
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

fn record_bytes<T: ByteOrder>(record_type: u32, misc: u16, body: &[u8]) -> Vec<u8> {
    Bytes::<T>::new()
        .u32(record_type)
        .u16(misc)
        .u16((body.len() + 8) as u16)
        .bytes(body)
        .build()
}

pub fn comm_body<T: ByteOrder>(pid: u32, comm: &str, time: u64) -> Vec<u8> {
    Bytes::<T>::new()
        .u32(pid)
        .u32(pid)
        .record_string(comm)
        .sample_id(pid, pid, time, 0, 1)
        .build()
}

pub fn sample_body<T: ByteOrder>(id: u64, ip: u64, pid: u32, time: u64, callchain: &[u64]) -> Vec<u8> {
    let mut bytes = Bytes::<T>::new()
        .u64(id)
        .u64(ip)
        .u32(pid)
        .u32(pid)
        .u64(time)
        .u32(3)
        .u32(0)
        .u64(4000)
        .u64(callchain.len() as u64);
    for address in callchain {
        bytes = bytes.u64(*address);
    }
    bytes.build()
}

pub fn mmap2_build_id_body<T: ByteOrder>(pid: u32, filename: &str, build_id: &[u8]) -> Vec<u8> {
    let mut id = build_id.to_vec();
    id.resize(20, 0);
    Bytes::<T>::new()
        .u32(pid)
        .u32(pid)
        .u64(0x7f00_0000_0000)
        .u64(0x2000)
        .u64(0)
        .u8(build_id.len() as u8)
        .u8(0)
        .u16(0)
        .bytes(&id)
        .u32(5)
        .u32(2)
        .record_string(filename)
        .sample_id(pid, pid, 1500, 0, 1)
        .build()
}

pub fn auxtrace_body<T: ByteOrder>(size: u64) -> Vec<u8> {
    Bytes::<T>::new()
        .u64(size)
        .u64(0x1000)
        .u64(0xabcd)
        .u32(0)
        .u32(42)
        .u32(1)
        .u32(0)
        .build()
}

/// A flat perf.data image.
pub struct FlatFile<T> {
    attrs: Vec<(PerfEventAttr, Vec<u64>)>,
    data: Vec<u8>,
    features: Vec<(u32, Vec<u8>)>,
    _order: PhantomData<T>,
}

impl<T: ByteOrder> Default for FlatFile<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ByteOrder> FlatFile<T> {
    pub fn new() -> Self {
        Self {
            attrs: Vec::new(),
            data: Vec::new(),
            features: Vec::new(),
            _order: PhantomData,
        }
    }

    pub fn attr(mut self, attr: PerfEventAttr, ids: &[u64]) -> Self {
        self.attrs.push((attr, ids.to_vec()));
        self
    }

    pub fn record(mut self, record_type: u32, misc: u16, body: &[u8]) -> Self {
        self.data
            .extend_from_slice(&record_bytes::<T>(record_type, misc, body));
        self
    }

    /// Bytes which are not counted in the preceding record's size.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn feature(mut self, feature: u32, payload: Vec<u8>) -> Self {
        self.features.push((feature, payload));
        self.features.sort_by_key(|(feature, _)| *feature);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let header_size = 104u64;
        let attr_size = PERF_EVENT_ATTR_SIZE as u64 + 16;

        let mut ids = Vec::new();
        let mut id_sections = Vec::new();
        for (_, attr_ids) in &self.attrs {
            let offset = header_size + ids.len() as u64;
            for id in attr_ids {
                ids.extend(Bytes::<T>::new().u64(*id).build());
            }
            id_sections.push((offset, attr_ids.len() as u64 * 8));
        }
        let attr_offset = header_size + ids.len() as u64;
        let mut attr_table = Vec::new();
        for ((attr, _), (offset, size)) in self.attrs.iter().zip(&id_sections) {
            attr_table.extend(attr_bytes::<T>(attr));
            attr_table.extend(Bytes::<T>::new().u64(*offset).u64(*size).build());
        }
        let data_offset = attr_offset + attr_table.len() as u64;
        let index_offset = data_offset + self.data.len() as u64;

        let mut index = Bytes::<T>::new();
        let mut payloads = Vec::new();
        let mut payload_offset = index_offset + self.features.len() as u64 * 16;
        let mut feature_words = [0u64; 4];
        for (feature, payload) in &self.features {
            index = index.u64(payload_offset).u64(payload.len() as u64);
            payload_offset += payload.len() as u64;
            payloads.extend_from_slice(payload);
            feature_words[(*feature / 64) as usize] |= 1 << (feature % 64);
        }

        let mut header = Bytes::<T>::new()
            .u64(LittleEndian::read_u64(b"PERFILE2"))
            .u64(header_size)
            .u64(attr_size)
            .u64(attr_offset)
            .u64(attr_table.len() as u64)
            .u64(data_offset)
            .u64(self.data.len() as u64)
            .u64(0)
            .u64(0);
        for word in feature_words {
            header = header.u64(word);
        }

        let mut file = header.build();
        file.extend(ids);
        file.extend(attr_table);
        file.extend_from_slice(&self.data);
        file.extend(index.build());
        file.extend(payloads);
        file
    }
}

/// A piped perf.data stream.
pub struct PipeFile<T> {
    data: Vec<u8>,
    _order: PhantomData<T>,
}

impl<T: ByteOrder> Default for PipeFile<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ByteOrder> PipeFile<T> {
    pub fn new() -> Self {
        let data = Bytes::<T>::new()
            .u64(LittleEndian::read_u64(b"PERFILE2"))
            .u64(16)
            .build();
        Self {
            data,
            _order: PhantomData,
        }
    }

    pub fn attr(self, attr: &PerfEventAttr, ids: &[u64]) -> Self {
        let mut body = attr_bytes::<T>(attr);
        for id in ids {
            body.extend(Bytes::<T>::new().u64(*id).build());
        }
        self.record(PERF_RECORD_HEADER_ATTR, 0, &body)
    }

    pub fn event_type(self, id: u64, name: &str) -> Self {
        let mut name_bytes = name.as_bytes().to_vec();
        name_bytes.resize(64, 0);
        let body = Bytes::<T>::new().u64(id).bytes(&name_bytes).build();
        self.record(PERF_RECORD_HEADER_EVENT_TYPE, 0, &body)
    }

    pub fn feature(self, feature: u32, payload: &[u8]) -> Self {
        let body = Bytes::<T>::new().u64(u64::from(feature)).bytes(payload).build();
        self.record(PERF_RECORD_HEADER_FEATURE, 0, &body)
    }

    pub fn tracing_data(self, tracing_data: &[u8]) -> Self {
        let body = Bytes::<T>::new().u32(tracing_data.len() as u32).u32(0).build();
        self.record(PERF_RECORD_HEADER_TRACING_DATA, 0, &body)
            .raw(tracing_data)
    }

    pub fn record(mut self, record_type: u32, misc: u16, body: &[u8]) -> Self {
        self.data
            .extend_from_slice(&record_bytes::<T>(record_type, misc, body));
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.data.clone()
    }
}

/// A flat file with one attr, a comm, an mmap2 with a build id, two samples
/// and some metadata.
pub fn sample_flat_file<T: ByteOrder>() -> Vec<u8> {
    FlatFile::<T>::new()
        .attr(attr(0), &[1])
        .record(PERF_RECORD_COMM, 0, &comm_body::<T>(1000, "sleep", 1000))
        .record(
            PERF_RECORD_MMAP2,
            PERF_RECORD_MISC_USER | PERF_RECORD_MISC_MMAP_BUILD_ID,
            &mmap2_build_id_body::<T>(1000, "/usr/lib/libc.so.6", &[0xab; 20]),
        )
        .record(
            PERF_RECORD_SAMPLE,
            PERF_RECORD_MISC_USER,
            &sample_body::<T>(1, 0x7f00_0000_1234, 1000, 2000, &[0x7f00_0000_1234, 0x4000]),
        )
        .record(
            PERF_RECORD_SAMPLE,
            PERF_RECORD_MISC_USER,
            &sample_body::<T>(1, 0x7f00_0000_1300, 1000, 3000, &[]),
        )
        .record(PERF_RECORD_FINISHED_ROUND, 0, &[])
        .feature(HEADER_HOSTNAME, Bytes::<T>::new().header_string("buildhost").build())
        .feature(HEADER_NRCPUS, Bytes::<T>::new().u32(8).u32(4).build())
        .feature(
            HEADER_CMDLINE,
            Bytes::<T>::new()
                .u32(3)
                .header_string("perf")
                .header_string("record")
                .header_string("sleep")
                .build(),
        )
        .feature(
            HEADER_EVENT_DESC,
            Bytes::<T>::new()
                .u32(1)
                .u32(PERF_EVENT_ATTR_SIZE as u32)
                .bytes(&attr_bytes::<T>(&attr(0)))
                .u32(1)
                .header_string("cycles")
                .u64(1)
                .build(),
        )
        .feature(HEADER_BRANCH_STACK, Vec::new())
        .build()
}
