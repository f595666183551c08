use std::io::Write;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use linux_perf_event_reader::Endianness;

use super::attr::{write_perf_event_attr, PERF_EVENT_ATTR_SIZE};
use super::build_id::BuildIdEvent;
use super::codec::ByteWriter;
use super::error::Error;
use super::feature_sections::{
    AttributeDescription, CpuTopologySection, GroupDescSection, HeaderString, HeaderStringList,
    HybridTopologySection, NumaTopologySection, PmuMappings,
};
use super::features::*;
use super::file_reader::feature_set_from_words;
use super::header::PerfHeader;
use super::proto::{PerfDataProto, PerfEventAttr, PerfFileAttr, PerfEventType};
use super::section::PerfFileSection;
use super::serializer::EventSerializer;

/// Writes a [`PerfDataProto`] as a flat perf.data file.
///
/// The file is laid out as
///
/// ```plain
/// header | ids of each attr | attr table | data | feature index | feature sections
/// ```
///
/// The feature sections are chosen by what the proto contains. The only
/// exception is `HEADER_BRANCH_STACK`, which has no payload and is taken
/// from `metadata_mask`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerfFileWriter {
    endian: Endianness,
}

impl Default for PerfFileWriter {
    fn default() -> Self {
        Self::new(Endianness::LittleEndian)
    }
}

impl PerfFileWriter {
    pub fn new(endian: Endianness) -> Self {
        Self { endian }
    }

    pub fn endian(&self) -> Endianness {
        self.endian
    }

    pub fn write(&self, proto: &PerfDataProto) -> Result<Vec<u8>, Error> {
        match self.endian {
            Endianness::LittleEndian => self.write_impl::<LittleEndian>(proto),
            Endianness::BigEndian => self.write_impl::<BigEndian>(proto),
        }
    }

    pub fn write_to<W: Write>(&self, proto: &PerfDataProto, mut writer: W) -> Result<(), Error> {
        writer.write_all(&self.write(proto)?)?;
        Ok(())
    }

    fn write_impl<T: ByteOrder>(&self, proto: &PerfDataProto) -> Result<Vec<u8>, Error> {
        let mut writer = ByteWriter::new();
        writer.write_zeros(PerfHeader::STRUCT_SIZE as usize);

        let mut id_sections = Vec::with_capacity(proto.file_attrs.len());
        for file_attr in &proto.file_attrs {
            let offset = writer.len() as u64;
            writer.write_u64_slice::<T>(&file_attr.ids);
            id_sections.push(PerfFileSection {
                offset,
                size: writer.len() as u64 - offset,
            });
        }

        let attr_offset = writer.len() as u64;
        for (file_attr, ids_section) in proto.file_attrs.iter().zip(&id_sections) {
            write_perf_event_attr::<T>(&file_attr.attr.clone().unwrap_or_default(), &mut writer);
            ids_section.write::<T>(&mut writer);
        }
        let attr_section = PerfFileSection {
            offset: attr_offset,
            size: writer.len() as u64 - attr_offset,
        };

        let serializer = EventSerializer::new(&proto.file_attrs, self.endian)?;
        let data_offset = writer.len() as u64;
        for event in &proto.events {
            serializer.write_event(event, &mut writer)?;
        }
        let data_section = PerfFileSection {
            offset: data_offset,
            size: writer.len() as u64 - data_offset,
        };

        let feature_sections = feature_sections::<T>(proto)?;
        let index_offset = writer.len();
        writer.write_zeros(feature_sections.len() * PerfFileSection::STRUCT_SIZE as usize);
        let mut features = FeatureSet::default();
        for (i, (feature, payload)) in feature_sections.iter().enumerate() {
            let entry_offset = index_offset + i * PerfFileSection::STRUCT_SIZE as usize;
            writer.patch_u64::<T>(entry_offset, writer.len() as u64);
            writer.patch_u64::<T>(entry_offset + 8, payload.len() as u64);
            writer.write_bytes(payload);
            features.insert(*feature);
        }
        log::debug!(
            "Wrote {} attrs, {} records and features {features:?}",
            proto.file_attrs.len(),
            proto.events.len()
        );

        let header = PerfHeader {
            endian: self.endian,
            header_size: PerfHeader::STRUCT_SIZE,
            attr_size: (PERF_EVENT_ATTR_SIZE as u64) + PerfFileSection::STRUCT_SIZE,
            attr_section,
            data_section,
            event_types_section: PerfFileSection::default(),
            features,
        };
        let mut header_bytes = ByteWriter::new();
        header.write::<T>(&mut header_bytes);

        let mut bytes = writer.into_inner();
        bytes[..header_bytes.len()].copy_from_slice(header_bytes.as_slice());
        Ok(bytes)
    }
}

fn section(write: impl FnOnce(&mut ByteWriter)) -> Vec<u8> {
    let mut writer = ByteWriter::new();
    write(&mut writer);
    writer.into_inner()
}

/// Serializes the feature sections for the contents of `proto`, ordered by
/// feature bit.
fn feature_sections<T: ByteOrder>(proto: &PerfDataProto) -> Result<Vec<(u32, Vec<u8>)>, Error> {
    let mut sections = Vec::new();

    if let Some(tracing_data) = &proto.tracing_data {
        sections.push((HEADER_TRACING_DATA, tracing_data.clone()));
    }

    if !proto.build_ids.is_empty() {
        let mut writer = ByteWriter::new();
        for entry in &proto.build_ids {
            BuildIdEvent::write::<T>(entry, &mut writer)?;
        }
        sections.push((HEADER_BUILD_ID, writer.into_inner()));
    }

    if let Some(strings) = &proto.string_metadata {
        let string_features = [
            (HEADER_HOSTNAME, &strings.hostname),
            (HEADER_OSRELEASE, &strings.kernel_version),
            (HEADER_VERSION, &strings.perf_version),
            (HEADER_ARCH, &strings.architecture),
            (HEADER_CPUDESC, &strings.cpu_description),
            (HEADER_CPUID, &strings.cpu_id),
        ];
        for (feature, value) in string_features {
            if let Some(value) = value {
                sections.push((feature, section(|w| HeaderString::write::<T>(value, w))));
            }
        }

        let tokens = if !strings.perf_command_line_tokens.is_empty() {
            strings.perf_command_line_tokens.clone()
        } else {
            strings
                .perf_command_line_whole
                .iter()
                .flat_map(|whole| whole.split(' '))
                .map(str::to_owned)
                .collect()
        };
        if !tokens.is_empty() {
            sections.push((
                HEADER_CMDLINE,
                section(|w| HeaderStringList::write::<T>(&tokens, w)),
            ));
        }
    }

    for metadata in &proto.uint32_metadata {
        sections.push((
            metadata.r#type,
            section(|w| {
                for value in &metadata.data {
                    w.write_u32::<T>(*value);
                }
            }),
        ));
    }
    for metadata in &proto.uint64_metadata {
        sections.push((
            metadata.r#type,
            section(|w| w.write_u64_slice::<T>(&metadata.data)),
        ));
    }

    if !proto.event_types.is_empty() {
        let descs = event_descriptions(&proto.file_attrs, &proto.event_types);
        sections.push((
            HEADER_EVENT_DESC,
            section(|w| AttributeDescription::write_event_desc_section::<T>(&descs, w)),
        ));
    }

    if let Some(topology) = &proto.cpu_topology {
        sections.push((
            HEADER_CPU_TOPOLOGY,
            section(|w| CpuTopologySection::write::<T>(topology, w)),
        ));
    }
    if !proto.numa_topology.is_empty() {
        sections.push((
            HEADER_NUMA_TOPOLOGY,
            section(|w| NumaTopologySection::write::<T>(&proto.numa_topology, w)),
        ));
    }
    if feature_set_from_words(&proto.metadata_mask).has_feature(HEADER_BRANCH_STACK) {
        sections.push((HEADER_BRANCH_STACK, Vec::new()));
    }
    if !proto.pmu_mappings.is_empty() {
        sections.push((
            HEADER_PMU_MAPPINGS,
            section(|w| PmuMappings::write::<T>(&proto.pmu_mappings, w)),
        ));
    }
    if !proto.group_desc.is_empty() {
        sections.push((
            HEADER_GROUP_DESC,
            section(|w| GroupDescSection::write::<T>(&proto.group_desc, w)),
        ));
    }
    if !proto.hybrid_topology.is_empty() {
        sections.push((
            HEADER_HYBRID_TOPOLOGY,
            section(|w| HybridTopologySection::write::<T>(&proto.hybrid_topology, w)),
        ));
    }
    for opaque in &proto.opaque_features {
        sections.push((opaque.feature, opaque.data.clone()));
    }

    // A feature bit can only be set once; the first section wins.
    sections.retain(|(feature, _)| *feature < 256);
    sections.sort_by_key(|(feature, _)| *feature);
    sections.dedup_by_key(|(feature, _)| *feature);
    Ok(sections)
}

/// Builds the `HEADER_EVENT_DESC` entries for the event types. An event type
/// is matched with the attr at the same index if their configs agree, and
/// otherwise with the first attr of the same config.
fn event_descriptions(
    file_attrs: &[PerfFileAttr],
    event_types: &[PerfEventType],
) -> Vec<AttributeDescription> {
    let has_config = |file_attr: &&PerfFileAttr, config: u64| {
        file_attr.attr.as_ref().map(|attr| attr.config) == Some(config)
    };
    event_types
        .iter()
        .enumerate()
        .map(|(index, event_type)| {
            let file_attr = file_attrs
                .get(index)
                .filter(|file_attr| has_config(file_attr, event_type.id))
                .or_else(|| {
                    file_attrs
                        .iter()
                        .find(|file_attr| has_config(file_attr, event_type.id))
                });
            match file_attr {
                Some(file_attr) => AttributeDescription {
                    attr: file_attr.attr.clone().unwrap_or_default(),
                    name: event_type.name.clone(),
                    event_ids: file_attr.ids.clone(),
                },
                None => AttributeDescription {
                    attr: PerfEventAttr {
                        config: event_type.id,
                        size: PERF_EVENT_ATTR_SIZE as u32,
                        sample_period: Some(0),
                        wakeup_events: Some(0),
                        ..Default::default()
                    },
                    name: event_type.name.clone(),
                    event_ids: Vec::new(),
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::proto::{StringMetadata, Uint32Metadata};

    #[test]
    fn empty_proto() {
        let bytes = PerfFileWriter::default()
            .write(&PerfDataProto::default())
            .unwrap();
        assert_eq!(bytes.len(), PerfHeader::STRUCT_SIZE as usize);
        let header = PerfHeader::parse(&bytes[..]).unwrap();
        assert!(header.features.is_empty());
        assert_eq!(header.attr_size, 152);
        assert_eq!(header.data_section.offset, PerfHeader::STRUCT_SIZE);
        assert_eq!(header.data_section.size, 0);
    }

    #[test]
    fn sections_are_ordered_and_unique() {
        let proto = PerfDataProto {
            string_metadata: Some(StringMetadata {
                hostname: Some("host".to_string()),
                perf_command_line_whole: Some("perf record -a".to_string()),
                ..Default::default()
            }),
            uint32_metadata: vec![
                Uint32Metadata {
                    r#type: HEADER_NRCPUS,
                    data: vec![8, 8],
                },
                Uint32Metadata {
                    r#type: HEADER_NRCPUS,
                    data: vec![4, 4],
                },
            ],
            metadata_mask: vec![1 << HEADER_BRANCH_STACK],
            ..Default::default()
        };
        let sections = feature_sections::<LittleEndian>(&proto).unwrap();
        let features: Vec<u32> = sections.iter().map(|(feature, _)| *feature).collect();
        assert_eq!(
            features,
            vec![HEADER_HOSTNAME, HEADER_NRCPUS, HEADER_CMDLINE, HEADER_BRANCH_STACK]
        );
        assert_eq!(sections[1].1, vec![8, 0, 0, 0, 8, 0, 0, 0]);
        assert!(sections[3].1.is_empty());
    }

    #[test]
    fn event_descriptions_match_attrs() {
        let file_attrs = vec![
            PerfFileAttr {
                attr: Some(PerfEventAttr {
                    config: 0,
                    ..Default::default()
                }),
                ids: vec![1, 2],
            },
            PerfFileAttr {
                attr: Some(PerfEventAttr {
                    config: 1,
                    ..Default::default()
                }),
                ids: vec![3],
            },
        ];
        let event_types = vec![
            PerfEventType {
                id: 1,
                name: "instructions".to_string(),
            },
            PerfEventType {
                id: 5,
                name: "other".to_string(),
            },
        ];
        let descs = event_descriptions(&file_attrs, &event_types);
        assert_eq!(descs[0].event_ids, vec![3]);
        assert_eq!(descs[0].name, "instructions");
        assert_eq!(descs[1].attr.config, 5);
        assert!(descs[1].event_ids.is_empty());
    }
}
