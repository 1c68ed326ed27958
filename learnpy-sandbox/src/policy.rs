//! Deny policy enforced inside the worker

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;

/// Category of operation a snippet may be denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeniedOperation {
    /// Creating, modifying or deleting files
    FilesystemWrite,
    /// Reading files outside the interpreter's library tree and scratch dir
    FilesystemRead,
    /// Sockets, DNS and the stdlib network clients
    Network,
    /// fork/exec/spawn, `os.system`, `subprocess`, signals to other processes
    ProcessSpawn,
    /// Starting threads
    ThreadSpawn,
    /// Loading native code (`ctypes`, `cffi`)
    NativeCode,
    /// Cross-frame tracing, profiling and garbage-collector introspection
    Introspection,
}

impl DeniedOperation {
    pub const ALL: [DeniedOperation; 7] = [
        DeniedOperation::FilesystemWrite,
        DeniedOperation::FilesystemRead,
        DeniedOperation::Network,
        DeniedOperation::ProcessSpawn,
        DeniedOperation::ThreadSpawn,
        DeniedOperation::NativeCode,
        DeniedOperation::Introspection,
    ];

    /// Python audit events that map to this category
    fn audit_events(self) -> &'static [&'static str] {
        match self {
            DeniedOperation::FilesystemWrite => &[
                "os.remove",
                "os.rename",
                "os.mkdir",
                "os.rmdir",
                "os.chmod",
                "os.chown",
                "os.chflags",
                "os.link",
                "os.symlink",
                "os.truncate",
                "os.utime",
                "os.mkfifo",
                "os.mknod",
                "shutil.copyfile",
                "shutil.copymode",
                "shutil.copystat",
                "shutil.move",
                "shutil.rmtree",
                "shutil.make_archive",
                "shutil.unpack_archive",
            ],
            // open/listdir/scandir are path-checked by the bootstrap itself;
            // a link could point a checked path anywhere
            DeniedOperation::FilesystemRead => &["os.chdir", "os.fchdir", "os.link", "os.symlink"],
            DeniedOperation::Network => &[
                "socket.__new__",
                "socket.connect",
                "socket.bind",
                "socket.sendto",
                "socket.sendmsg",
                "socket.getaddrinfo",
                "socket.gethostbyname",
                "socket.gethostbyaddr",
                "urllib.Request",
                "http.client.connect",
                "ftplib.connect",
                "smtplib.connect",
                "poplib.connect",
                "imaplib.open",
                "nntplib.connect",
                "telnetlib.Telnet.open",
                "webbrowser.open",
            ],
            DeniedOperation::ProcessSpawn => &[
                "os.system",
                "os.exec",
                "os.fork",
                "os.forkpty",
                "os.posix_spawn",
                "os.spawn",
                "os.startfile",
                "os.kill",
                "os.killpg",
                "subprocess.Popen",
                "pty.spawn",
                "signal.pthread_kill",
            ],
            DeniedOperation::ThreadSpawn => {
                &["_thread.start_new_thread", "_thread.start_joinable_thread"]
            }
            DeniedOperation::NativeCode => &[
                "ctypes.dlopen",
                "ctypes.dlsym",
                "ctypes.dlsym/handle",
                "ctypes.cdata",
                "ctypes.cdata/buffer",
                "ctypes.addressof",
                "ctypes.call_function",
                "ctypes.create_string_buffer",
                "ctypes.string_at",
                "ctypes.wstring_at",
                "mmap.__new__",
            ],
            DeniedOperation::Introspection => &[
                "sys._current_frames",
                "sys._current_exceptions",
                "sys.settrace",
                "sys.setprofile",
                "sys.addaudithook",
                "sys.monitoring.register_callback",
                "gc.get_objects",
                "gc.get_referrers",
                "gc.get_referents",
                "code.__new__",
                "function.__new__",
            ],
        }
    }

    /// Modules whose import alone is refused
    fn blocked_modules(self) -> &'static [&'static str] {
        match self {
            DeniedOperation::FilesystemWrite | DeniedOperation::FilesystemRead => &[],
            DeniedOperation::Network => &["socket", "_socket", "ssl", "_ssl"],
            DeniedOperation::ProcessSpawn => &[
                "subprocess",
                "_posixsubprocess",
                "multiprocessing",
                "_multiprocessing",
                "pty",
            ],
            DeniedOperation::ThreadSpawn => &[],
            DeniedOperation::NativeCode => &["ctypes", "_ctypes", "cffi", "_cffi_backend", "mmap"],
            DeniedOperation::Introspection => &["_testcapi", "_testinternalcapi", "_xxsubinterpreters"],
        }
    }

    /// Function attributes whose assignment is refused
    fn guarded_attributes(self) -> &'static [&'static str] {
        match self {
            DeniedOperation::Introspection => &["__code__", "__defaults__", "__kwdefaults__"],
            _ => &[],
        }
    }

    /// Frame-reaching events and attributes, refused while the worker's own
    /// policy check is on the stack
    fn frame_access(self) -> &'static [&'static str] {
        match self {
            DeniedOperation::Introspection => &[
                "sys._getframe",
                "sys._getframemodulename",
                "tb_frame",
                "gi_frame",
                "cr_frame",
                "ag_frame",
                "f_back",
                "f_locals",
                "f_globals",
            ],
            _ => &[],
        }
    }
}

/// Set of denied operations, passed to the worker as JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenyPolicy {
    denied: BTreeSet<DeniedOperation>,
}

impl Default for DenyPolicy {
    /// Everything denied
    fn default() -> Self {
        Self {
            denied: DeniedOperation::ALL.into_iter().collect(),
        }
    }
}

impl DenyPolicy {
    /// Deny nothing (trusted code only)
    pub fn allow_all() -> Self {
        Self {
            denied: BTreeSet::new(),
        }
    }

    pub fn deny(mut self, op: DeniedOperation) -> Self {
        self.denied.insert(op);
        self
    }

    pub fn allow(mut self, op: DeniedOperation) -> Self {
        self.denied.remove(&op);
        self
    }

    pub fn is_denied(&self, op: DeniedOperation) -> bool {
        self.denied.contains(&op)
    }

    /// Policy document understood by the Python bootstrap
    pub fn to_worker_json(&self) -> String {
        let mut events = BTreeSet::new();
        let mut modules = BTreeSet::new();
        let mut attributes = BTreeSet::new();
        let mut frame_access = BTreeSet::new();
        for op in &self.denied {
            events.extend(op.audit_events().iter().copied());
            modules.extend(op.blocked_modules().iter().copied());
            attributes.extend(op.guarded_attributes().iter().copied());
            frame_access.extend(op.frame_access().iter().copied());
        }

        json!({
            "events": events,
            "modules": modules,
            "attributes": attributes,
            "frame_access": frame_access,
            "deny_writes": self.is_denied(DeniedOperation::FilesystemWrite),
            "deny_reads": self.is_denied(DeniedOperation::FilesystemRead),
            "deny_threads": self.is_denied(DeniedOperation::ThreadSpawn),
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn worker_doc(policy: &DenyPolicy) -> Value {
        serde_json::from_str(&policy.to_worker_json()).unwrap()
    }

    fn contains(list: &Value, item: &str) -> bool {
        list.as_array()
            .unwrap()
            .iter()
            .any(|v| v.as_str() == Some(item))
    }

    #[test]
    fn test_default_policy_denies_everything() {
        let policy = DenyPolicy::default();
        for op in DeniedOperation::ALL {
            assert!(policy.is_denied(op), "{op:?} should be denied");
        }

        let doc = worker_doc(&policy);
        assert!(contains(&doc["events"], "os.system"));
        assert!(contains(&doc["events"], "socket.connect"));
        assert!(contains(&doc["modules"], "ctypes"));
        assert!(contains(&doc["modules"], "subprocess"));
        assert_eq!(doc["deny_writes"], Value::Bool(true));
        assert_eq!(doc["deny_reads"], Value::Bool(true));
        assert_eq!(doc["deny_threads"], Value::Bool(true));
    }

    #[test]
    fn test_allowing_a_category_removes_its_events() {
        let policy = DenyPolicy::default().allow(DeniedOperation::Network);
        let doc = worker_doc(&policy);
        assert!(!contains(&doc["events"], "socket.connect"));
        assert!(!contains(&doc["modules"], "socket"));
        assert!(contains(&doc["events"], "os.system"));
    }

    #[test]
    fn test_allow_all_is_empty() {
        let doc = worker_doc(&DenyPolicy::allow_all());
        assert!(doc["events"].as_array().unwrap().is_empty());
        assert!(doc["attributes"].as_array().unwrap().is_empty());
        assert!(doc["frame_access"].as_array().unwrap().is_empty());
        assert_eq!(doc["deny_writes"], Value::Bool(false));
    }

    #[test]
    fn test_introspection_guards_function_internals_and_frames() {
        let doc = worker_doc(&DenyPolicy::default());
        assert!(contains(&doc["attributes"], "__defaults__"));
        assert!(contains(&doc["attributes"], "__code__"));
        assert!(contains(&doc["frame_access"], "sys._getframe"));
        assert!(contains(&doc["frame_access"], "tb_frame"));
        // Frame access is only refused inside a check; ordinary use stays allowed
        assert!(!contains(&doc["events"], "sys._getframe"));

        let open = worker_doc(&DenyPolicy::default().allow(DeniedOperation::Introspection));
        assert!(open["attributes"].as_array().unwrap().is_empty());
        assert!(!contains(&open["events"], "gc.get_referrers"));
    }
}
