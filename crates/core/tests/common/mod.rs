#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use pahole_core::model::ObjectFile;
use pahole_core::services::analysis::{AnalysisError, LayoutTool, ToolOutput};
use pahole_core::services::classify::Mode;

/// Two 4-byte members, a 4-byte hole and 4 bytes of tail padding.
pub const FOO_LAYOUT: &str = "\
struct Foo {
\tint                        a;                    /*     0     4 */

\t/* XXX 4 bytes hole, try to pack */

\tint                        b;                    /*     8     4 */

\t/* size: 16, cachelines: 1, members: 2 */
\t/* sum members: 8, holes: 1, sum holes: 4 */
\t/* padding: 4 */
\t/* last cacheline: 16 bytes */
};
";

pub const FOO_PACKABLE: &str = "Foo\t16\t8\t8\n";

/// A hole the tool advises packing, although reordering would not shrink the struct.
pub const BAR_LAYOUT: &str = "\
struct Bar {
\tchar                       a;                    /*     0     1 */

\t/* XXX 3 bytes hole, try to pack */

\tint                        b;                    /*     4     4 */

\t/* size: 8, cachelines: 1, members: 2 */
\t/* sum members: 5, holes: 1, sum holes: 3 */
\t/* last cacheline: 8 bytes */
};
";

pub const POINT_LAYOUT: &str = "\
struct Point {
\tint                        x;                    /*     0     4 */
\tint                        y;                    /*     4     4 */

\t/* size: 8, cachelines: 1, members: 2 */
\t/* last cacheline: 8 bytes */
};
";

pub const FLAGS_LAYOUT: &str = "\
typedef struct {
\tunsigned int               ready:1;              /*     0: 0  4 */
\tunsigned int               mode:3;               /*     0: 1  4 */

\t/* XXX 28 bits hole, try to pack */

\tint                        count;                /*     4     4 */

\t/* size: 8, cachelines: 1, members: 3 */
\t/* bit holes: 1, sum bit holes: 28 bits */
\t/* last cacheline: 8 bytes */
} flags_t;
";

pub const MESSAGE_LAYOUT: &str = "\
struct Message {
\tint                        kind;                 /*     0     4 */

\t/* XXX 4 bytes hole, try to pack */

\tunion {
\t\tlong int           number;               /*     8     8 */
\t\tchar *             text;                 /*     8     8 */
\t};                                               /*     8     8 */
\tshort int                  len;                  /*    16     2 */

\t/* size: 24, cachelines: 1, members: 3 */
\t/* sum members: 14, holes: 1, sum holes: 4 */
\t/* padding: 6 */
\t/* last cacheline: 24 bytes */
};
";

pub fn object(path: &str) -> ObjectFile {
    ObjectFile::new(path)
}

/// In-memory layout tool keyed by object file name.
#[derive(Default)]
pub struct FakeTool {
    outputs: HashMap<String, (String, String)>,
    pub calls: Mutex<Vec<ObjectFile>>,
}

impl FakeTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, file_name: &str, layout: &str, packable: &str) -> Self {
        self.outputs.insert(file_name.to_string(), (layout.to_string(), packable.to_string()));
        self
    }

    pub fn called_names(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|o| o.file_name().unwrap_or_default().to_string())
            .collect()
    }
}

impl LayoutTool for FakeTool {
    fn version(&self) -> Result<String, AnalysisError> {
        Ok("v1.25-fake".into())
    }

    fn analyze(&self, object: &ObjectFile, mode: Mode) -> Result<ToolOutput, AnalysisError> {
        self.calls.lock().unwrap().push(object.clone());
        let name = object.file_name().unwrap_or_default();
        match self.outputs.get(name) {
            Some((layout, packable)) => Ok(ToolOutput {
                object: object.clone(),
                layout: layout.clone(),
                packable: match mode {
                    Mode::Lazy => Some(packable.clone()),
                    Mode::Strict => None,
                },
            }),
            None => Err(AnalysisError::ToolFailed {
                tool: "fake".into(),
                object: object.path.clone(),
                status: "exit status: 1".into(),
                stderr: "corrupt debug information".into(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}
