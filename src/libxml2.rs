//! LibXML2 FFI Wrapper Module
//!
//! Safe wrapper around the libxml2 calls needed for XML Schema validation of
//! BCF documents.
//!
//! No mature pure Rust library validates XML Schema (XSD) documents, so the
//! validator binds libxml2 directly, the same way `xmllint --schema` does.
//!
//! - Schema sets are compiled from files on disk so that `xs:include` and
//!   `xs:import` resolve relative to the schema documents themselves.
//! - Documents are validated from memory, so entries read out of an archive
//!   never need to be extracted first.
//! - Every warning and error is captured through libxml2's structured error
//!   callbacks together with its line and column.

use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};

use libc::{c_char, c_int, c_void};
use url::Url;

use crate::error::{LibXml2Error, LibXml2Result};

/// Global initialization flag for libxml2
///
/// libxml2's initialization functions are NOT thread-safe, so they run
/// exactly once behind `std::sync::Once`.
static LIBXML2_INIT: Once = Once::new();

/// Do not fetch DTDs or entities from the network while parsing documents
const XML_PARSE_NONET: c_int = 1 << 11;

/// `xmlErrorLevel` values
const XML_ERR_WARNING: c_int = 1;

/// Opaque libxml2 structures
#[repr(C)]
pub struct XmlSchema {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaParserCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaValidCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlDoc {
    _private: [u8; 0],
}

// External libxml2 FFI declarations
#[cfg_attr(target_os = "windows", link(name = "libxml2"))]
#[cfg_attr(not(target_os = "windows"), link(name = "xml2"))]
unsafe extern "C" {
    pub fn xmlInitParser();

    // Schema parsing functions
    pub fn xmlSchemaNewParserCtxt(url: *const c_char) -> *mut XmlSchemaParserCtxt;
    pub fn xmlSchemaNewMemParserCtxt(
        buffer: *const c_char,
        size: c_int,
    ) -> *mut XmlSchemaParserCtxt;
    pub fn xmlSchemaSetParserStructuredErrors(
        ctxt: *mut XmlSchemaParserCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchemaParse(ctxt: *const XmlSchemaParserCtxt) -> *mut XmlSchema;
    pub fn xmlSchemaFreeParserCtxt(ctxt: *mut XmlSchemaParserCtxt);
    pub fn xmlSchemaFree(schema: *mut XmlSchema);

    // Schema validation functions
    pub fn xmlSchemaNewValidCtxt(schema: *const XmlSchema) -> *mut XmlSchemaValidCtxt;
    pub fn xmlSchemaFreeValidCtxt(ctxt: *mut XmlSchemaValidCtxt);
    pub fn xmlSchemaSetValidStructuredErrors(
        ctxt: *mut XmlSchemaValidCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchemaValidateDoc(ctxt: *mut XmlSchemaValidCtxt, doc: *mut XmlDoc) -> c_int;

    // Document parsing
    pub fn xmlReadMemory(
        buffer: *const c_char,
        size: c_int,
        url: *const c_char,
        encoding: *const c_char,
        options: c_int,
    ) -> *mut XmlDoc;
    pub fn xmlFreeDoc(doc: *mut XmlDoc);
    pub fn xmlSetStructuredErrorFunc(ctx: *mut c_void, handler: XmlStructuredErrorFunc);
}

#[repr(C)]
pub struct xmlError {
    pub domain: c_int,
    pub code: c_int,
    pub message: *const c_char,
    pub level: c_int,
    pub file: *const c_char,
    pub line: c_int,
    pub str1: *const c_char,
    pub str2: *const c_char,
    pub str3: *const c_char,
    pub int1: c_int,
    pub int2: c_int,
    pub ctxt: *mut c_void,
    pub node: *mut c_void,
}

pub type XmlStructuredErrorFunc =
    Option<unsafe extern "C" fn(user_data: *mut c_void, error: *mut xmlError)>;

/// Severity of a libxml2 diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One warning or error reported by libxml2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDiagnostic {
    pub severity: Severity,
    pub message: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

/// Callback for libxml2 to report parser and validation problems (structured)
unsafe extern "C" fn structured_error_callback(user_data: *mut c_void, error: *mut xmlError) {
    if user_data.is_null() || error.is_null() {
        return;
    }
    let diagnostics = unsafe { &mut *(user_data as *mut Vec<XmlDiagnostic>) };
    let error = unsafe { &*error };

    let message = if error.message.is_null() {
        String::from("unknown libxml2 error")
    } else {
        let c_str = unsafe { CStr::from_ptr(error.message) };
        c_str.to_string_lossy().trim().to_string()
    };
    let severity = if error.level == XML_ERR_WARNING {
        Severity::Warning
    } else {
        Severity::Error
    };

    diagnostics.push(XmlDiagnostic {
        severity,
        message,
        line: u32::try_from(error.line).ok().filter(|&l| l > 0),
        column: u32::try_from(error.int2).ok().filter(|&c| c > 0),
    });
}

/// Thread-safe wrapper for libxml2 schema pointer with proper resource management
#[derive(Debug)]
pub struct XmlSchemaPtr {
    inner: Arc<XmlSchemaInner>,
}

#[derive(Debug)]
struct XmlSchemaInner {
    ptr: *mut XmlSchema,
    _phantom: PhantomData<XmlSchema>,
}

// Safety: libxml2 documentation states that xmlSchema structures are thread-safe for reading
// See: http://xmlsoft.org/threads.html
unsafe impl Send for XmlSchemaInner {}
unsafe impl Sync for XmlSchemaInner {}

impl XmlSchemaPtr {
    /// # Safety
    ///
    /// The pointer must come from `xmlSchemaParse` and must not be freed elsewhere.
    unsafe fn from_raw(ptr: *mut XmlSchema, messages: Vec<String>) -> LibXml2Result<Self> {
        if ptr.is_null() {
            return Err(LibXml2Error::SchemaParseFailed { messages });
        }

        Ok(XmlSchemaPtr {
            inner: Arc::new(XmlSchemaInner {
                ptr,
                _phantom: PhantomData,
            }),
        })
    }

    pub(crate) fn as_ptr(&self) -> *const XmlSchema {
        self.inner.ptr
    }
}

impl Clone for XmlSchemaPtr {
    fn clone(&self) -> Self {
        XmlSchemaPtr {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Drop for XmlSchemaInner {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                xmlSchemaFree(self.ptr);
            }
            self.ptr = std::ptr::null_mut();
        }
    }
}

/// Escape a path for use inside an XML attribute value
fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

/// Driver schema including every member of a schema set by `file://` URI
///
/// Paths must be absolute.
fn driver_schema(files: &[PathBuf]) -> LibXml2Result<String> {
    let mut driver = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <xs:schema xmlns:xs=\"http://www.w3.org/2001/XMLSchema\">\n",
    );
    for file in files {
        let location = Url::from_file_path(file).map_err(|_| LibXml2Error::InvalidLocation {
            path: file.clone(),
        })?;
        driver.push_str(&format!(
            "  <xs:include schemaLocation=\"{}\"/>\n",
            escape_attribute(location.as_str())
        ));
    }
    driver.push_str("</xs:schema>\n");
    Ok(driver)
}

/// LibXML2 wrapper providing safe access to schema compilation and validation
///
/// Validation runs synchronously on the calling thread. Parsed schemas are
/// reference counted and may be shared freely.
pub struct LibXml2Wrapper {
    _phantom: PhantomData<()>,
}

impl LibXml2Wrapper {
    /// Create a new wrapper, initializing libxml2 on first use
    pub fn new() -> Self {
        LIBXML2_INIT.call_once(|| unsafe {
            xmlInitParser();
        });

        LibXml2Wrapper {
            _phantom: PhantomData,
        }
    }

    /// Compile a schema set from files on disk
    ///
    /// A single file is parsed directly; several files are combined through an
    /// in-memory driver schema that includes each of them by absolute path.
    /// All messages libxml2 reports while compiling are returned on failure.
    pub fn parse_schema_files(&self, files: &[PathBuf]) -> LibXml2Result<XmlSchemaPtr> {
        let mut messages: Vec<XmlDiagnostic> = Vec::new();

        let schema_ptr = match files {
            [] => {
                return Err(LibXml2Error::SchemaParseFailed {
                    messages: vec!["empty schema set".to_string()],
                });
            }
            [single] => {
                let c_path = path_to_cstring(single)?;
                unsafe {
                    let parser_ctxt = xmlSchemaNewParserCtxt(c_path.as_ptr());
                    Self::parse_with(parser_ctxt, &mut messages)?
                }
            }
            several => {
                let absolute: Vec<PathBuf> = several
                    .iter()
                    .map(|f| std::path::absolute(f).unwrap_or_else(|_| f.clone()))
                    .collect();
                let driver = driver_schema(&absolute)?;
                unsafe {
                    let parser_ctxt = xmlSchemaNewMemParserCtxt(
                        driver.as_ptr() as *const c_char,
                        driver.len() as c_int,
                    );
                    Self::parse_with(parser_ctxt, &mut messages)?
                }
            }
        };

        let messages = messages.into_iter().map(|d| d.message).collect();
        unsafe { XmlSchemaPtr::from_raw(schema_ptr, messages) }
    }

    /// # Safety
    ///
    /// `parser_ctxt` must be null or a fresh parser context; it is freed here.
    unsafe fn parse_with(
        parser_ctxt: *mut XmlSchemaParserCtxt,
        messages: &mut Vec<XmlDiagnostic>,
    ) -> LibXml2Result<*mut XmlSchema> {
        if parser_ctxt.is_null() {
            return Err(LibXml2Error::MemoryAllocation);
        }
        unsafe {
            xmlSchemaSetParserStructuredErrors(
                parser_ctxt,
                Some(structured_error_callback),
                messages as *mut Vec<XmlDiagnostic> as *mut c_void,
            );
            let schema_ptr = xmlSchemaParse(parser_ctxt);
            xmlSchemaFreeParserCtxt(parser_ctxt);
            Ok(schema_ptr)
        }
    }

    /// Validate an in-memory document against a schema
    ///
    /// Well-formedness errors and schema violations are both returned as
    /// diagnostics; validation never stops at the first one. `name` is used as
    /// the document URL in libxml2 messages.
    pub fn validate_memory(
        &self,
        schema: &XmlSchemaPtr,
        content: &[u8],
        name: &str,
    ) -> LibXml2Result<Vec<XmlDiagnostic>> {
        let size = c_int::try_from(content.len()).map_err(|_| LibXml2Error::DocumentTooLarge {
            name: name.to_string(),
            size: content.len(),
        })?;
        let c_name = CString::new(name).map_err(|_| LibXml2Error::InternalError {
            name: name.to_string(),
            code: -1,
        })?;

        let mut diagnostics: Vec<XmlDiagnostic> = Vec::new();
        let diagnostics_ptr = &mut diagnostics as *mut Vec<XmlDiagnostic> as *mut c_void;

        unsafe {
            xmlSetStructuredErrorFunc(diagnostics_ptr, Some(structured_error_callback));
            let doc = xmlReadMemory(
                content.as_ptr() as *const c_char,
                size,
                c_name.as_ptr(),
                std::ptr::null(),
                XML_PARSE_NONET,
            );
            xmlSetStructuredErrorFunc(std::ptr::null_mut(), None);

            if doc.is_null() {
                if diagnostics.is_empty() {
                    diagnostics.push(XmlDiagnostic {
                        severity: Severity::Error,
                        message: "document is not well-formed XML".to_string(),
                        line: None,
                        column: None,
                    });
                }
                return Ok(diagnostics);
            }

            let valid_ctxt = xmlSchemaNewValidCtxt(schema.as_ptr());
            if valid_ctxt.is_null() {
                xmlFreeDoc(doc);
                return Err(LibXml2Error::ValidationContextCreationFailed);
            }
            xmlSchemaSetValidStructuredErrors(
                valid_ctxt,
                Some(structured_error_callback),
                diagnostics_ptr,
            );

            let result_code = xmlSchemaValidateDoc(valid_ctxt, doc);

            xmlSchemaFreeValidCtxt(valid_ctxt);
            xmlFreeDoc(doc);

            if result_code < 0 {
                return Err(LibXml2Error::InternalError {
                    name: name.to_string(),
                    code: result_code,
                });
            }
        }

        Ok(diagnostics)
    }
}

fn path_to_cstring(path: &Path) -> LibXml2Result<CString> {
    path.to_str()
        .and_then(|s| CString::new(s).ok())
        .ok_or_else(|| LibXml2Error::InvalidLocation {
            path: path.to_path_buf(),
        })
}

impl Default for LibXml2Wrapper {
    fn default() -> Self {
        Self::new()
    }
}
