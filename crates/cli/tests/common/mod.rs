#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use pahole_core::model::ObjectFile;
use pahole_core::services::analysis::{AnalysisError, LayoutTool, ToolOutput};
use pahole_core::services::classify::Mode;

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

pub const POINT_LAYOUT: &str = "\
struct Point {
\tint                        x;                    /*     0     4 */
\tint                        y;                    /*     4     4 */

\t/* size: 8, cachelines: 1, members: 2 */
\t/* last cacheline: 8 bytes */
};
";

/// Lay out `obj/<name>` files and a JSON config in `root`; returns the config path.
pub fn project(root: &Path, objects: &[&str], blacklist: &[&str]) -> PathBuf {
    fs::create_dir_all(root.join("obj")).unwrap();
    for name in objects {
        fs::write(root.join("obj").join(name), b"\x7fELF").unwrap();
    }
    let config = serde_json::json!({
        "paths": [{ "source": ["obj/*.o"], "blacklist": blacklist }],
        "ignore": [],
    });
    let path = root.join("demo.json");
    fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    path
}

/// Layout tool that returns the same dump for every object, failing on names containing "bad".
pub struct StaticTool {
    pub layout: &'static str,
    pub packable: &'static str,
}

impl LayoutTool for StaticTool {
    fn version(&self) -> Result<String, AnalysisError> {
        Ok("v1.25-static".into())
    }

    fn analyze(&self, object: &ObjectFile, mode: Mode) -> Result<ToolOutput, AnalysisError> {
        if object.file_name().is_some_and(|n| n.contains("bad")) {
            return Err(AnalysisError::ToolFailed {
                tool: "static".into(),
                object: object.path.clone(),
                status: "exit status: 1".into(),
                stderr: "no debugging information".into(),
            });
        }
        Ok(ToolOutput {
            object: object.clone(),
            layout: self.layout.to_string(),
            packable: (mode == Mode::Lazy).then(|| self.packable.to_string()),
        })
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
