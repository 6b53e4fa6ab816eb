#![allow(dead_code)]

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const MARKUP_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="Markup">
        <xs:complexType>
            <xs:sequence>
                <xs:element name="Topic">
                    <xs:complexType>
                        <xs:sequence>
                            <xs:element name="Title" type="xs:string"/>
                        </xs:sequence>
                        <xs:attribute name="Guid" type="xs:string" use="required"/>
                    </xs:complexType>
                </xs:element>
            </xs:sequence>
        </xs:complexType>
    </xs:element>
</xs:schema>"#;

pub const VISINFO_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="VisualizationInfo">
        <xs:complexType>
            <xs:sequence>
                <xs:any minOccurs="0" maxOccurs="unbounded" processContents="skip"/>
            </xs:sequence>
            <xs:attribute name="Guid" type="xs:string"/>
        </xs:complexType>
    </xs:element>
</xs:schema>"#;

pub const PROJECT_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="ProjectExtension">
        <xs:complexType>
            <xs:sequence>
                <xs:any minOccurs="0" maxOccurs="unbounded" processContents="skip"/>
            </xs:sequence>
        </xs:complexType>
    </xs:element>
</xs:schema>"#;

pub const VERSION_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="Version">
        <xs:complexType mixed="true">
            <xs:sequence>
                <xs:any minOccurs="0" maxOccurs="unbounded" processContents="skip"/>
            </xs:sequence>
            <xs:attribute name="VersionId" type="xs:string"/>
        </xs:complexType>
    </xs:element>
</xs:schema>"#;

pub const VERSION_2_1: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Version VersionId="2.1">
</Version>"#;

/// Markup document declaring one topic
pub fn markup(topic_guid: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Markup>\n  <Topic Guid=\"{}\">\n    <Title>Clash</Title>\n  </Topic>\n</Markup>\n",
        topic_guid
    )
}

/// Markup document whose topic lacks the required title
pub fn markup_without_title(topic_guid: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Markup>\n  <Topic Guid=\"{}\"/>\n</Markup>\n",
        topic_guid
    )
}

pub fn write_file(root: &Path, name: &str, content: impl AsRef<[u8]>) -> PathBuf {
    let path = root.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

pub fn write_archive(path: &Path, entries: &[(&str, &str)]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    for (name, content) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// Per-version schema tree for 2.1 under `<root>/schemas`
pub fn write_schemas(root: &Path) -> PathBuf {
    let folder = root.join("schemas").join("v2.1");
    write_file(&folder, "markup.xsd", MARKUP_XSD);
    write_file(&folder, "visinfo.xsd", VISINFO_XSD);
    write_file(&folder, "project.xsd", PROJECT_XSD);
    write_file(&folder, "version.xsd", VERSION_XSD);
    root.join("schemas")
}

/// Archive `<folder>/<name>` plus an identical mirror in `<folder>/unzipped`
pub fn write_case(folder: &Path, name: &str, entries: &[(&str, &str)]) -> PathBuf {
    let archive = folder.join(name);
    write_archive(&archive, entries);
    let mirror = folder.join("unzipped");
    for (entry, content) in entries {
        write_file(&mirror, entry, content);
    }
    archive
}

/// Archive with stored entries whose data is altered after writing, so that
/// the first occurrence of `marker` fails its checksum when read
pub fn write_corrupt_archive(path: &Path, entries: &[(&str, &str)], marker: &str) -> PathBuf {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, content) in entries {
        zip.start_file(*name, stored).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();

    let mut bytes = fs::read(path).unwrap();
    let at = bytes
        .windows(marker.len())
        .position(|w| w == marker.as_bytes())
        .unwrap();
    bytes[at] ^= 0x20;
    fs::write(path, bytes).unwrap();
    path.to_path_buf()
}

/// Writer handed to a reporter whose output stays readable afterwards
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
