use std::collections::HashSet;

use byteorder::ByteOrder;

use crate::attr::{parse_perf_event_attr, write_perf_event_attr, PERF_EVENT_ATTR_SIZE};
use crate::codec::{trim_at_nul, ByteCursor, ByteWriter};
use crate::constants::BUILD_ID_NAME_ALIGN;
use crate::error::{Error, ReadError};
use crate::proto::{
    CpuTopology, GroupDesc, HybridTopologyPmu, NumaNode, PerfEventAttr, PmuMapping,
};

/// `perf_header_string`: a u32 length followed by a NUL-padded string.
pub struct HeaderString;

impl HeaderString {
    pub fn parse<T: ByteOrder>(cursor: &mut ByteCursor) -> Result<String, ReadError> {
        let len = cursor.read_u32::<T>()?;
        let bytes = cursor.read_bytes(len as usize)?;
        Ok(String::from_utf8_lossy(trim_at_nul(bytes)).into_owned())
    }

    /// perf pads header strings to 64 bytes, including the NUL terminator.
    fn padded_len(s: &str) -> usize {
        (s.len() + 1).div_ceil(BUILD_ID_NAME_ALIGN) * BUILD_ID_NAME_ALIGN
    }

    pub fn write<T: ByteOrder>(s: &str, writer: &mut ByteWriter) {
        let len = Self::padded_len(s);
        writer.write_u32::<T>(len as u32);
        writer.write_fixed_string(s, len);
    }

    /// Parses a section which consists of a single string.
    pub fn parse_section<T: ByteOrder>(data: &[u8]) -> Result<String, Error> {
        let mut cursor = ByteCursor::new(data, ReadError::String);
        Ok(Self::parse::<T>(&mut cursor)?)
    }
}

/// `perf_header_string_list`, used by `HEADER_CMDLINE`.
pub struct HeaderStringList;

impl HeaderStringList {
    pub fn parse<T: ByteOrder>(data: &[u8]) -> Result<Vec<String>, Error> {
        let mut cursor = ByteCursor::new(data, ReadError::StringLen);
        let nr = cursor.read_u32::<T>()?;
        let mut strings = Vec::new();
        cursor.set_context(ReadError::String);
        for _ in 0..nr {
            strings.push(HeaderString::parse::<T>(&mut cursor)?);
        }
        Ok(strings)
    }

    pub fn write<T: ByteOrder>(strings: &[String], writer: &mut ByteWriter) {
        writer.write_u32::<T>(strings.len() as u32);
        for s in strings {
            HeaderString::write::<T>(s, writer);
        }
    }
}

/// Reads a section made of u32 values, like `HEADER_NRCPUS`.
pub fn parse_u32_values<T: ByteOrder>(data: &[u8]) -> Vec<u32> {
    warn_on_partial_value(data.len(), 4);
    data.chunks_exact(4).map(T::read_u32).collect()
}

/// Reads a section made of u64 values, like `HEADER_TOTAL_MEM`.
pub fn parse_u64_values<T: ByteOrder>(data: &[u8]) -> Vec<u64> {
    warn_on_partial_value(data.len(), 8);
    data.chunks_exact(8).map(T::read_u64).collect()
}

fn warn_on_partial_value(len: usize, value_size: usize) {
    let rest = len % value_size;
    if rest != 0 {
        log::warn!(
            "Ignoring {rest} trailing bytes of a section with {value_size}-byte values"
        );
    }
}

/// A single event attr with name and corresponding event IDs.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDescription {
    pub attr: PerfEventAttr,
    pub name: String,
    pub event_ids: Vec<u64>,
}

impl AttributeDescription {
    /// Parse the `HEADER_EVENT_DESC` section of a perf.data file into a Vec of `AttributeDescription` structs.
    pub fn parse_event_desc_section<T: ByteOrder>(data: &[u8]) -> Result<Vec<Self>, Error> {
        // ```c
        // struct {
        //   uint32_t nr; /* number of events */
        //   uint32_t attr_size; /* size of each perf_event_attr */
        //   struct {
        //     struct perf_event_attr attr;  /* size of attr_size */
        //     uint32_t nr_ids;
        //     struct perf_header_string event_string;
        //     uint64_t ids[nr_ids];
        //   } events[nr]; /* Variable length records */
        // };
        // ```
        let mut cursor = ByteCursor::new(data, ReadError::EventDesc);
        let nr = cursor.read_u32::<T>()?;
        let attr_size = cursor.read_u32::<T>()?;
        let mut attributes = Vec::new();
        for _ in 0..nr {
            let attr_bytes = cursor.read_bytes(attr_size as usize)?;
            let attr = parse_perf_event_attr::<T>(attr_bytes)?;
            let nr_ids = cursor.read_u32::<T>()?;
            let name = HeaderString::parse::<T>(&mut cursor)?;
            let event_ids = cursor.read_u64_vec::<T>(u64::from(nr_ids))?;
            attributes.push(AttributeDescription {
                attr,
                name,
                event_ids,
            });
        }
        Ok(attributes)
    }

    pub fn write_event_desc_section<T: ByteOrder>(descs: &[Self], writer: &mut ByteWriter) {
        writer.write_u32::<T>(descs.len() as u32);
        writer.write_u32::<T>(PERF_EVENT_ATTR_SIZE as u32);
        for desc in descs {
            write_perf_event_attr::<T>(&desc.attr, writer);
            writer.write_u32::<T>(desc.event_ids.len() as u32);
            HeaderString::write::<T>(&desc.name, writer);
            writer.write_u64_slice::<T>(&desc.event_ids);
        }
    }
}

/// Upper bound on the number of CPUs a topology section may name in total.
pub const MAX_TOPOLOGY_CPUS: usize = 1 << 16;

/// Expands a cpu list like `"0-3,8"` into `[0, 1, 2, 3, 8]`.
///
/// Returns `None` for malformed or inverted ranges, and for lists naming
/// more than [`MAX_TOPOLOGY_CPUS`] CPUs.
pub fn expand_cpu_list(cpus: &str) -> Option<Vec<u32>> {
    let mut list = Vec::new();
    for range in cpus.trim().split(',').filter(|range| !range.is_empty()) {
        let (first, last) = match range.split_once('-') {
            Some((first, last)) => (first.trim().parse().ok()?, last.trim().parse().ok()?),
            None => {
                let cpu: u32 = range.trim().parse().ok()?;
                (cpu, cpu)
            }
        };
        if last < first {
            return None;
        }
        let count = usize::try_from(last - first).ok()?.checked_add(1)?;
        if count > MAX_TOPOLOGY_CPUS - list.len() {
            return None;
        }
        list.extend(first..=last);
    }
    Some(list)
}

/// Expands several cpu lists, keeping the total under [`MAX_TOPOLOGY_CPUS`].
fn expand_cpu_lists<'a>(
    lists: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<Vec<u32>>, Error> {
    let mut total = 0;
    let mut expanded = Vec::new();
    for list in lists {
        let cpus =
            expand_cpu_list(list).ok_or(Error::InconsistentTopology("invalid cpu list"))?;
        total += cpus.len();
        if total > MAX_TOPOLOGY_CPUS {
            return Err(Error::InconsistentTopology("too many cpus in topology"));
        }
        expanded.push(cpus);
    }
    Ok(expanded)
}

fn parse_counted_strings<T: ByteOrder>(
    cursor: &mut ByteCursor,
    what: &'static str,
) -> Result<Vec<String>, Error> {
    let nr = cursor.read_u32::<T>()?;
    let mut strings = Vec::new();
    for _ in 0..nr {
        let s = HeaderString::parse::<T>(cursor).map_err(|_| Error::InconsistentTopology(what))?;
        strings.push(s);
    }
    Ok(strings)
}

/// `HEADER_CPU_TOPOLOGY`
pub struct CpuTopologySection;

impl CpuTopologySection {
    /// Parses the sibling lists and checks that every CPU named in the core
    /// siblings is covered by the thread siblings. Per-cpu data which newer
    /// perf versions append is kept verbatim.
    pub fn parse<T: ByteOrder>(data: &[u8]) -> Result<CpuTopology, Error> {
        let mut cursor = ByteCursor::new(data, ReadError::CpuTopology);
        let core_siblings = parse_counted_strings::<T>(
            &mut cursor,
            "core sibling count exceeds the section",
        )?;
        let thread_siblings = parse_counted_strings::<T>(
            &mut cursor,
            "thread sibling count exceeds the section",
        )?;

        let thread_cpus: HashSet<u32> =
            expand_cpu_lists(thread_siblings.iter().map(String::as_str))?
                .into_iter()
                .flatten()
                .collect();
        let core_cpus = expand_cpu_lists(core_siblings.iter().map(String::as_str))?;
        if core_cpus
            .iter()
            .flatten()
            .any(|cpu| !thread_cpus.contains(cpu))
        {
            return Err(Error::InconsistentTopology(
                "thread siblings don't cover all CPUs of the core siblings",
            ));
        }

        Ok(CpuTopology {
            core_siblings,
            thread_siblings,
            trailing_data: cursor.rest().to_vec(),
        })
    }

    pub fn write<T: ByteOrder>(topology: &CpuTopology, writer: &mut ByteWriter) {
        HeaderStringList::write::<T>(&topology.core_siblings, writer);
        HeaderStringList::write::<T>(&topology.thread_siblings, writer);
        writer.write_bytes(&topology.trailing_data);
    }
}

/// `HEADER_NUMA_TOPOLOGY`
pub struct NumaTopologySection;

impl NumaTopologySection {
    pub fn parse<T: ByteOrder>(data: &[u8]) -> Result<Vec<NumaNode>, Error> {
        // struct {
        //     uint32_t nr;
        //     struct {
        //        uint32_t nodenr;
        //        uint64_t mem_total;
        //        uint64_t mem_free;
        //        struct perf_header_string cpus;
        //     } nodes[nr]; /* Variable length records */
        // };
        let mut cursor = ByteCursor::new(data, ReadError::NumaTopology);
        let nr = cursor.read_u32::<T>()?;
        let mut nodes = Vec::new();
        for _ in 0..nr {
            let id = cursor.read_u32::<T>()?;
            let total_memory = cursor.read_u64::<T>()?;
            let free_memory = cursor.read_u64::<T>()?;
            let cpu_list = HeaderString::parse::<T>(&mut cursor)?;
            nodes.push(NumaNode {
                id,
                total_memory,
                free_memory,
                cpu_list,
            });
        }
        Ok(nodes)
    }

    pub fn write<T: ByteOrder>(nodes: &[NumaNode], writer: &mut ByteWriter) {
        writer.write_u32::<T>(nodes.len() as u32);
        for node in nodes {
            writer.write_u32::<T>(node.id);
            writer.write_u64::<T>(node.total_memory);
            writer.write_u64::<T>(node.free_memory);
            HeaderString::write::<T>(&node.cpu_list, writer);
        }
    }
}

/// The names of the dynamic PMU types, e.g. `kprobe` or `uprobe`, which let
/// you interpret the config fields of attrs with these types.
pub struct PmuMappings;

impl PmuMappings {
    pub fn parse<T: ByteOrder>(data: &[u8]) -> Result<Vec<PmuMapping>, Error> {
        // struct {
        //     uint32_t nr;
        //     struct pmu {
        //        uint32_t pmu_type;
        //        struct perf_header_string pmu_name;
        //     } [nr]; /* Variable length records */
        // };
        let mut cursor = ByteCursor::new(data, ReadError::PmuMappings);
        let nr = cursor.read_u32::<T>()?;
        let mut mappings = Vec::new();
        for _ in 0..nr {
            let r#type = cursor.read_u32::<T>()?;
            let name = HeaderString::parse::<T>(&mut cursor)?;
            mappings.push(PmuMapping { r#type, name });
        }
        Ok(mappings)
    }

    pub fn write<T: ByteOrder>(mappings: &[PmuMapping], writer: &mut ByteWriter) {
        writer.write_u32::<T>(mappings.len() as u32);
        for mapping in mappings {
            writer.write_u32::<T>(mapping.r#type);
            HeaderString::write::<T>(&mapping.name, writer);
        }
    }
}

/// `HEADER_GROUP_DESC`
pub struct GroupDescSection;

impl GroupDescSection {
    pub fn parse<T: ByteOrder>(data: &[u8]) -> Result<Vec<GroupDesc>, Error> {
        let mut cursor = ByteCursor::new(data, ReadError::GroupDesc);
        let nr = cursor.read_u32::<T>()?;
        let mut groups = Vec::new();
        for _ in 0..nr {
            let name = HeaderString::parse::<T>(&mut cursor)?;
            let leader_idx = cursor.read_u32::<T>()?;
            let num_members = cursor.read_u32::<T>()?;
            groups.push(GroupDesc {
                name,
                leader_idx,
                num_members,
            });
        }
        Ok(groups)
    }

    pub fn write<T: ByteOrder>(groups: &[GroupDesc], writer: &mut ByteWriter) {
        writer.write_u32::<T>(groups.len() as u32);
        for group in groups {
            HeaderString::write::<T>(&group.name, writer);
            writer.write_u32::<T>(group.leader_idx);
            writer.write_u32::<T>(group.num_members);
        }
    }
}

/// `HEADER_HYBRID_TOPOLOGY`: which CPUs belong to which PMU on systems with
/// different core types.
pub struct HybridTopologySection;

impl HybridTopologySection {
    pub fn parse<T: ByteOrder>(data: &[u8]) -> Result<Vec<HybridTopologyPmu>, Error> {
        let mut cursor = ByteCursor::new(data, ReadError::HybridTopology);
        let nr = cursor.read_u32::<T>()?;
        let mut entries = Vec::new();
        for _ in 0..nr {
            let pmu_name = HeaderString::parse::<T>(&mut cursor)?;
            let cpus = HeaderString::parse::<T>(&mut cursor)?;
            entries.push((pmu_name, cpus));
        }
        let cpu_lists = expand_cpu_lists(entries.iter().map(|(_, cpus)| cpus.as_str()))?;
        let pmus = entries
            .into_iter()
            .zip(cpu_lists)
            .map(|((pmu_name, cpus), cpu_list)| HybridTopologyPmu {
                pmu_name,
                cpus,
                cpu_list,
            })
            .collect();
        Ok(pmus)
    }

    pub fn write<T: ByteOrder>(pmus: &[HybridTopologyPmu], writer: &mut ByteWriter) {
        writer.write_u32::<T>(pmus.len() as u32);
        for pmu in pmus {
            HeaderString::write::<T>(&pmu.pmu_name, writer);
            HeaderString::write::<T>(&pmu.cpus, writer);
        }
    }
}

#[cfg(test)]
mod test {
    use byteorder::{BigEndian, LittleEndian};

    use super::*;

    fn strings(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cpu_lists() {
        assert_eq!(expand_cpu_list("2-5"), Some(vec![2, 3, 4, 5]));
        assert_eq!(expand_cpu_list("0,2-3,7"), Some(vec![0, 2, 3, 7]));
        assert_eq!(expand_cpu_list(""), Some(vec![]));
        assert_eq!(expand_cpu_list("3-1"), None);
        assert_eq!(expand_cpu_list("5-2,7"), None);
        assert_eq!(expand_cpu_list("a-b"), None);
        assert_eq!(expand_cpu_list("0-"), None);
        assert_eq!(expand_cpu_list("1,x"), None);
    }

    #[test]
    fn huge_cpu_ranges_are_rejected() {
        assert_eq!(expand_cpu_list("0-4294967295"), None);
        assert_eq!(expand_cpu_list("0-100000000"), None);
        assert_eq!(expand_cpu_list("0-65535,70000"), None);
        assert_eq!(
            expand_cpu_list("0-65535").map(|cpus| cpus.len()),
            Some(MAX_TOPOLOGY_CPUS)
        );
    }

    #[test]
    fn huge_topology_is_rejected() {
        let topology = CpuTopology {
            core_siblings: strings(&["0-4294967295"]),
            thread_siblings: strings(&["0-4294967295"]),
            trailing_data: vec![],
        };
        let mut writer = ByteWriter::new();
        CpuTopologySection::write::<LittleEndian>(&topology, &mut writer);
        assert!(matches!(
            CpuTopologySection::parse::<LittleEndian>(writer.as_slice()),
            Err(Error::InconsistentTopology(_))
        ));

        // Each list is small, but together they name too many cpus.
        let topology = CpuTopology {
            core_siblings: strings(&["0-1"]),
            thread_siblings: strings(&["0-40000", "0-40000"]),
            trailing_data: vec![],
        };
        let mut writer = ByteWriter::new();
        CpuTopologySection::write::<LittleEndian>(&topology, &mut writer);
        assert!(matches!(
            CpuTopologySection::parse::<LittleEndian>(writer.as_slice()),
            Err(Error::InconsistentTopology(_))
        ));
    }

    #[test]
    fn malformed_topology_list() {
        let topology = CpuTopology {
            core_siblings: strings(&["0-3"]),
            thread_siblings: strings(&["3-0"]),
            trailing_data: vec![],
        };
        let mut writer = ByteWriter::new();
        CpuTopologySection::write::<LittleEndian>(&topology, &mut writer);
        assert!(matches!(
            CpuTopologySection::parse::<LittleEndian>(writer.as_slice()),
            Err(Error::InconsistentTopology(_))
        ));
    }

    #[test]
    fn malformed_hybrid_topology() {
        for cpus in ["5-2", "a-b", "0-4294967295"] {
            let mut writer = ByteWriter::new();
            writer.write_u32::<LittleEndian>(1);
            HeaderString::write::<LittleEndian>("cpu_core", &mut writer);
            HeaderString::write::<LittleEndian>(cpus, &mut writer);
            assert!(matches!(
                HybridTopologySection::parse::<LittleEndian>(writer.as_slice()),
                Err(Error::InconsistentTopology(_))
            ));
        }
    }

    #[test]
    fn partial_values_are_ignored() {
        let data = [8, 0, 0, 0, 4, 0, 0, 0, 1, 2];
        assert_eq!(parse_u32_values::<LittleEndian>(&data), vec![8, 4]);
        assert_eq!(parse_u64_values::<LittleEndian>(&data), vec![0x4_0000_0008]);
    }

    #[test]
    fn header_strings_are_padded() {
        let mut writer = ByteWriter::new();
        HeaderString::write::<LittleEndian>("x86_64", &mut writer);
        assert_eq!(writer.len(), 4 + 64);
        assert_eq!(
            HeaderString::parse_section::<LittleEndian>(writer.as_slice()).unwrap(),
            "x86_64"
        );
    }

    #[test]
    fn cpu_topology() {
        let topology = CpuTopology {
            core_siblings: strings(&["0-7"]),
            thread_siblings: strings(&["0-1", "2-3", "4", "5", "6", "7"]),
            trailing_data: vec![0, 0, 0, 0, 1, 0, 0, 0],
        };
        let mut writer = ByteWriter::new();
        CpuTopologySection::write::<BigEndian>(&topology, &mut writer);
        assert_eq!(
            CpuTopologySection::parse::<BigEndian>(writer.as_slice()).unwrap(),
            topology
        );
    }

    #[test]
    fn thread_sibling_count_beyond_section() {
        let mut writer = ByteWriter::new();
        HeaderStringList::write::<LittleEndian>(&strings(&["0-3"]), &mut writer);
        writer.write_u32::<LittleEndian>(1000);
        HeaderString::write::<LittleEndian>("0-1", &mut writer);
        HeaderString::write::<LittleEndian>("2-3", &mut writer);
        assert!(matches!(
            CpuTopologySection::parse::<LittleEndian>(writer.as_slice()),
            Err(Error::InconsistentTopology(_))
        ));
    }

    #[test]
    fn thread_siblings_must_cover_core_siblings() {
        let topology = CpuTopology {
            core_siblings: strings(&["0-3"]),
            thread_siblings: strings(&["0-1"]),
            trailing_data: vec![],
        };
        let mut writer = ByteWriter::new();
        CpuTopologySection::write::<LittleEndian>(&topology, &mut writer);
        assert!(matches!(
            CpuTopologySection::parse::<LittleEndian>(writer.as_slice()),
            Err(Error::InconsistentTopology(_))
        ));
    }

    #[test]
    fn hybrid_topology() {
        let mut writer = ByteWriter::new();
        writer.write_u32::<LittleEndian>(2);
        for s in ["cpu_core", "0-1", "cpu_atom", "2-5"] {
            HeaderString::write::<LittleEndian>(s, &mut writer);
        }
        let pmus = HybridTopologySection::parse::<LittleEndian>(writer.as_slice()).unwrap();
        assert_eq!(pmus.len(), 2);
        assert_eq!(pmus[0].pmu_name, "cpu_core");
        assert_eq!(pmus[0].cpu_list, vec![0, 1]);
        assert_eq!(pmus[1].cpus, "2-5");
        assert_eq!(pmus[1].cpu_list, vec![2, 3, 4, 5]);
    }

    #[test]
    fn event_desc() {
        let descs = vec![AttributeDescription {
            attr: PerfEventAttr {
                r#type: 1,
                size: PERF_EVENT_ATTR_SIZE as u32,
                config: 0x9,
                sample_period: Some(4000),
                wakeup_events: Some(0),
                ..Default::default()
            },
            name: "cpu-clock".to_string(),
            event_ids: vec![11, 12],
        }];
        let mut writer = ByteWriter::new();
        AttributeDescription::write_event_desc_section::<BigEndian>(&descs, &mut writer);
        let parsed =
            AttributeDescription::parse_event_desc_section::<BigEndian>(writer.as_slice())
                .unwrap();
        assert_eq!(parsed, descs);
    }

    #[test]
    fn numa_pmu_and_groups() {
        let nodes = vec![NumaNode {
            id: 1,
            total_memory: 1 << 30,
            free_memory: 1 << 20,
            cpu_list: "0-3".to_string(),
        }];
        let mut writer = ByteWriter::new();
        NumaTopologySection::write::<LittleEndian>(&nodes, &mut writer);
        assert_eq!(
            NumaTopologySection::parse::<LittleEndian>(writer.as_slice()).unwrap(),
            nodes
        );

        let mappings = vec![
            PmuMapping {
                r#type: 4,
                name: "cpu".to_string(),
            },
            PmuMapping {
                r#type: 8,
                name: "uprobe".to_string(),
            },
        ];
        let mut writer = ByteWriter::new();
        PmuMappings::write::<LittleEndian>(&mappings, &mut writer);
        assert_eq!(
            PmuMappings::parse::<LittleEndian>(writer.as_slice()).unwrap(),
            mappings
        );

        let groups = vec![GroupDesc {
            name: "{cycles,instructions}".to_string(),
            leader_idx: 0,
            num_members: 2,
        }];
        let mut writer = ByteWriter::new();
        GroupDescSection::write::<LittleEndian>(&groups, &mut writer);
        assert_eq!(
            GroupDescSection::parse::<LittleEndian>(writer.as_slice()).unwrap(),
            groups
        );
    }
}
