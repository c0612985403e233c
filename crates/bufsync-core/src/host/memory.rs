//! In-process model of an editor host.
//!
//! `MemoryHost` keeps buffers, windows, tab pages, buffer options and
//! variables, buffer-local autocommands and a fake "disk" in a single mutex.
//! It understands the ex-command subset parsed by `host::command`, which is
//! everything bufsync issues itself.
//!
//! Host rules that matter to callers are enforced:
//!
//! - a buffer always holds at least one line
//! - line edits fail with `E21` while `'modifiable'` is off
//! - `:edit` on a modified buffer fails with `E37` unless `!` is given
//! - `BufReadCmd` autocommands replace reading from disk on `:edit`

use super::command::{self, Command, Expr, Invocation, Setting};
use super::{truthy, BufNr, HostSession, WinId};
use crate::{BufsyncError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const FIRST_WINID: WinId = 1000;
const MAX_AUTOCMD_NESTING: usize = 10;

const BOOLEAN_OPTIONS: &[&str] = &["modifiable", "modified", "bomb", "endofline"];
const STRING_OPTIONS: &[&str] = &[
    "fileencoding",
    "fileformat",
    "fileencodings",
    "fileformats",
    "buftype",
];

fn canonical_option(name: &str) -> &str {
    match name {
        "ma" => "modifiable",
        "mod" => "modified",
        "eol" => "endofline",
        "fenc" => "fileencoding",
        "ff" => "fileformat",
        "fencs" => "fileencodings",
        "ffs" => "fileformats",
        "bt" => "buftype",
        other => other,
    }
}

struct Buffer {
    name: String,
    lines: Vec<String>,
    options: BTreeMap<String, Value>,
    vars: BTreeMap<String, Value>,
}

impl Buffer {
    fn new(name: String, lines: Vec<String>) -> Self {
        let options = BTreeMap::from([
            ("modifiable".to_string(), json!(1)),
            ("modified".to_string(), json!(0)),
            ("bomb".to_string(), json!(0)),
            ("endofline".to_string(), json!(1)),
            ("fileencoding".to_string(), json!("")),
            ("fileformat".to_string(), json!("unix")),
            ("fileencodings".to_string(), json!("ucs-bom,utf-8,default,latin1")),
            ("fileformats".to_string(), json!("unix,dos")),
            ("buftype".to_string(), json!("")),
        ]);
        let lines = if lines.is_empty() {
            vec![String::new()]
        } else {
            lines
        };
        Self {
            name,
            lines,
            options,
            vars: BTreeMap::new(),
        }
    }

    fn flag(&self, option: &str) -> bool {
        self.options.get(option).is_some_and(truthy)
    }

    fn set_flag(&mut self, option: &str, value: bool) {
        self.options.insert(option.to_string(), json!(i32::from(value)));
    }

    fn set_option(&mut self, name: &str, value: &Value) -> std::result::Result<(), String> {
        let name = canonical_option(name);
        if BOOLEAN_OPTIONS.contains(&name) {
            self.set_flag(name, truthy(value));
            return Ok(());
        }
        if !STRING_OPTIONS.contains(&name) {
            return Err(format!("E355: Unknown option: {}", name));
        }

        let text = super::string_value(value);
        if name == "fileformat" && !matches!(text.as_str(), "unix" | "dos" | "mac") {
            return Err(format!("E474: Invalid argument: fileformat={}", text));
        }
        self.options.insert(name.to_string(), Value::String(text));
        Ok(())
    }

    fn edit(
        &mut self,
        start: usize,
        end: Option<usize>,
        lines: Vec<String>,
    ) -> std::result::Result<(), String> {
        if !self.flag("modifiable") {
            return Err("E21: Cannot make changes, 'modifiable' is off".to_string());
        }
        let len = self.lines.len();
        let end = end.unwrap_or(len);
        if start > end || end > len {
            return Err(format!("Index out of bounds: {}..{} of {}", start, end, len));
        }

        self.lines.splice(start..end, lines);
        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.set_flag("modified", true);
        Ok(())
    }
}

struct Window {
    id: WinId,
    bufnr: BufNr,
}

struct TabPage {
    windows: Vec<Window>,
    current: usize,
}

struct Autocmd {
    group: Option<String>,
    event: String,
    bufnr: BufNr,
    command: String,
}

struct HostState {
    buffers: BTreeMap<BufNr, Buffer>,
    tabs: Vec<TabPage>,
    current_tab: usize,
    next_bufnr: BufNr,
    next_winid: WinId,
    files: HashMap<String, Vec<String>>,
    augroups: Vec<String>,
    active_augroup: Option<String>,
    autocmds: Vec<Autocmd>,
}

impl HostState {
    fn new() -> Self {
        let mut state = Self {
            buffers: BTreeMap::new(),
            tabs: Vec::new(),
            current_tab: 0,
            next_bufnr: 1,
            next_winid: FIRST_WINID,
            files: HashMap::new(),
            augroups: Vec::new(),
            active_augroup: None,
            autocmds: Vec::new(),
        };
        let bufnr = state.create_buffer(String::new());
        let id = state.alloc_winid();
        state.tabs.push(TabPage {
            windows: vec![Window { id, bufnr }],
            current: 0,
        });
        state
    }

    fn tab(&self) -> &TabPage {
        &self.tabs[self.current_tab]
    }

    fn current_window(&self) -> &Window {
        let tab = self.tab();
        &tab.windows[tab.current]
    }

    fn current_bufnr(&self) -> BufNr {
        self.current_window().bufnr
    }

    fn buffer(&self, bufnr: BufNr) -> std::result::Result<&Buffer, String> {
        self.buffers
            .get(&bufnr)
            .ok_or_else(|| format!("E86: Buffer {} does not exist", bufnr))
    }

    fn buffer_mut(&mut self, bufnr: BufNr) -> std::result::Result<&mut Buffer, String> {
        self.buffers
            .get_mut(&bufnr)
            .ok_or_else(|| format!("E86: Buffer {} does not exist", bufnr))
    }

    fn find_buffer(&self, name: &str) -> Option<BufNr> {
        self.buffers
            .iter()
            .find(|(_, buffer)| buffer.name == name)
            .map(|(bufnr, _)| *bufnr)
    }

    fn create_buffer(&mut self, name: String) -> BufNr {
        let bufnr = self.next_bufnr;
        self.next_bufnr += 1;
        let lines = self.files.get(&name).cloned().unwrap_or_default();
        self.buffers.insert(bufnr, Buffer::new(name, lines));
        bufnr
    }

    fn alloc_winid(&mut self) -> WinId {
        let id = self.next_winid;
        self.next_winid += 1;
        id
    }

    fn show_in_current_window(&mut self, bufnr: BufNr) {
        let tab = &mut self.tabs[self.current_tab];
        tab.windows[tab.current].bufnr = bufnr;
    }

    /// Open a window above the current one and make it current.
    fn split_window(&mut self, bufnr: BufNr) {
        let id = self.alloc_winid();
        let tab = &mut self.tabs[self.current_tab];
        tab.windows.insert(tab.current, Window { id, bufnr });
    }

    /// Close the current window; the one below it (or above, for the last
    /// one) becomes current.
    fn close_window(&mut self) -> std::result::Result<(), String> {
        let tab = &mut self.tabs[self.current_tab];
        if tab.windows.len() == 1 {
            return Err("E444: Cannot close last window".to_string());
        }
        tab.windows.remove(tab.current);
        tab.current = tab.current.min(tab.windows.len() - 1);
        Ok(())
    }

    fn goto_window(&mut self, winid: WinId) -> bool {
        for (tabnr, tab) in self.tabs.iter_mut().enumerate() {
            if let Some(index) = tab.windows.iter().position(|w| w.id == winid) {
                tab.current = index;
                self.current_tab = tabnr;
                return true;
            }
        }
        false
    }

    /// Buffer for a percent-escaped name, created when missing.
    fn resolve_name(&mut self, raw: &str) -> std::result::Result<BufNr, String> {
        let name = urlencoding::decode(raw)
            .map_err(|_| format!("E499: Name is not valid UTF-8: {}", raw))?
            .into_owned();
        Ok(match self.find_buffer(&name) {
            Some(bufnr) => bufnr,
            None => self.create_buffer(name),
        })
    }

    fn get_var(&self, bufnr: BufNr, name: &str) -> std::result::Result<Value, String> {
        let buffer = self.buffer(bufnr)?;
        match name.strip_prefix('&') {
            Some(option) => buffer
                .options
                .get(canonical_option(option))
                .cloned()
                .ok_or_else(|| format!("E113: Unknown option: {}", option)),
            None => Ok(buffer
                .vars
                .get(name)
                .cloned()
                .unwrap_or_else(|| Value::String(String::new()))),
        }
    }

    fn set_var(&mut self, bufnr: BufNr, name: &str, value: Value) -> std::result::Result<(), String> {
        let buffer = self.buffer_mut(bufnr)?;
        match name.strip_prefix('&') {
            Some(option) => buffer.set_option(option, &value),
            None => {
                buffer.vars.insert(name.to_string(), value);
                Ok(())
            }
        }
    }

    fn run_line(&mut self, line: &str, depth: usize) -> std::result::Result<(), String> {
        for invocation in command::parse(line)? {
            self.run(invocation, depth)?;
        }
        Ok(())
    }

    fn run(&mut self, invocation: Invocation, depth: usize) -> std::result::Result<(), String> {
        let Invocation { noautocmd, command } = invocation;
        match command {
            Command::Edit { bang, name } => {
                let current = self.current_bufnr();
                let target = match name {
                    Some(raw) => self.resolve_name(&raw)?,
                    None => current,
                };
                if target == current {
                    self.reload(current, bang, noautocmd, depth)?;
                } else {
                    self.show_in_current_window(target);
                }
            }
            Command::Split { name } => {
                let bufnr = match name {
                    Some(raw) => self.resolve_name(&raw)?,
                    None => self.current_bufnr(),
                };
                self.split_window(bufnr);
            }
            Command::New => {
                let bufnr = self.create_buffer(String::new());
                self.split_window(bufnr);
            }
            Command::TabEdit { name } => {
                let bufnr = match name {
                    Some(raw) => self.resolve_name(&raw)?,
                    None => self.create_buffer(String::new()),
                };
                let id = self.alloc_winid();
                self.tabs.push(TabPage {
                    windows: vec![Window { id, bufnr }],
                    current: 0,
                });
                self.current_tab = self.tabs.len() - 1;
            }
            Command::Close => self.close_window()?,
            Command::Buffer(bufnr) => {
                self.buffer(bufnr)?;
                self.show_in_current_window(bufnr);
            }
            Command::Call(expr) => {
                self.eval(&expr)?;
            }
            Command::Augroup(name) => {
                if name.eq_ignore_ascii_case("END") {
                    self.active_augroup = None;
                } else {
                    if !self.augroups.contains(&name) {
                        self.augroups.push(name.clone());
                    }
                    self.active_augroup = Some(name);
                }
            }
            Command::AutocmdRemove {
                group,
                event,
                pattern,
            } => {
                let group = self.autocmd_group(group)?;
                let bufnr = match pattern {
                    Some(pattern) => Some(self.buffer_pattern(&pattern)?),
                    None => None,
                };
                let event = event.filter(|e| e != "*");
                self.autocmds.retain(|autocmd| {
                    let matches = autocmd.group == group
                        && event
                            .as_ref()
                            .map_or(true, |e| autocmd.event.eq_ignore_ascii_case(e))
                        && bufnr.map_or(true, |b| autocmd.bufnr == b);
                    !matches
                });
            }
            Command::Autocmd {
                group,
                event,
                pattern,
                command,
            } => {
                let group = self.autocmd_group(group)?;
                let bufnr = self.buffer_pattern(&pattern)?;
                self.autocmds.push(Autocmd {
                    group,
                    event,
                    bufnr,
                    command,
                });
            }
            Command::SetLocal(settings) => {
                let bufnr = self.current_bufnr();
                for setting in settings {
                    let (name, value) = match setting {
                        Setting::Enable(name) => (name, json!(1)),
                        Setting::Disable(name) => (name, json!(0)),
                        Setting::Assign(name, value) => (name, Value::String(value)),
                    };
                    self.buffer_mut(bufnr)?.set_option(&name, &value)?;
                }
            }
        }
        Ok(())
    }

    fn autocmd_group(&self, group: Option<String>) -> std::result::Result<Option<String>, String> {
        match group {
            Some(name) if !self.augroups.contains(&name) => {
                Err(format!("E216: No such group or event: {}", name))
            }
            Some(name) => Ok(Some(name)),
            None => Ok(self.active_augroup.clone()),
        }
    }

    fn buffer_pattern(&self, pattern: &str) -> std::result::Result<BufNr, String> {
        if pattern == "<buffer>" {
            return Ok(self.current_bufnr());
        }
        let bufnr = pattern
            .strip_prefix("<buffer=")
            .and_then(|rest| rest.strip_suffix('>'))
            .and_then(|n| n.parse::<BufNr>().ok())
            .ok_or_else(|| format!("E680: <buffer=N>: unsupported pattern {}", pattern))?;
        self.buffer(bufnr)
            .map_err(|_| format!("E680: <buffer={}>: invalid buffer number", bufnr))?;
        Ok(bufnr)
    }

    fn reload(
        &mut self,
        bufnr: BufNr,
        bang: bool,
        noautocmd: bool,
        depth: usize,
    ) -> std::result::Result<(), String> {
        let buffer = self.buffer(bufnr)?;
        if buffer.flag("modified") && !bang {
            return Err("E37: No write since last change (add ! to override)".to_string());
        }

        let hooks: Vec<String> = if noautocmd {
            Vec::new()
        } else {
            self.autocmds
                .iter()
                .filter(|a| a.bufnr == bufnr && a.event.eq_ignore_ascii_case("BufReadCmd"))
                .map(|a| a.command.clone())
                .collect()
        };

        if hooks.is_empty() {
            let lines = self.files.get(&buffer.name).cloned().unwrap_or_default();
            let buffer = self.buffer_mut(bufnr)?;
            buffer.lines = if lines.is_empty() {
                vec![String::new()]
            } else {
                lines
            };
        } else {
            if depth >= MAX_AUTOCMD_NESTING {
                return Err("E218: autocommand nesting too deep".to_string());
            }
            for hook in hooks {
                self.run_line(&hook, depth + 1)?;
            }
        }

        self.buffer_mut(bufnr)?.set_flag("modified", false);
        Ok(())
    }

    fn eval(&mut self, expr: &Expr) -> std::result::Result<Value, String> {
        let (name, args) = match expr {
            Expr::Number(n) => return Ok(json!(n)),
            Expr::String(s) => return Ok(json!(s)),
            Expr::Call(name, args) => (name.as_str(), args),
        };
        let args = args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let arity = |n: usize| {
            if args.len() == n {
                Ok(())
            } else {
                Err(format!("E118: Wrong number of arguments for function: {}", name))
            }
        };

        match name {
            "bufnr" => Ok(json!(self.current_bufnr())),
            "win_gotoid" => {
                arity(1)?;
                let winid = args[0].as_u64().unwrap_or(0);
                Ok(json!(i32::from(self.goto_window(winid))))
            }
            "getbufvar" => {
                arity(2)?;
                let bufnr = self.bufnr_arg(&args[0])?;
                self.get_var(bufnr, &super::string_value(&args[1]))
            }
            "setbufvar" => {
                arity(3)?;
                let bufnr = self.bufnr_arg(&args[0])?;
                self.set_var(bufnr, &super::string_value(&args[1]), args[2].clone())?;
                Ok(json!(0))
            }
            "setbufline" => {
                arity(3)?;
                let bufnr = self.bufnr_arg(&args[0])?;
                let len = self.buffer(bufnr)?.lines.len();
                let lnum = lnum_arg(&args[1], len)?;
                if lnum == 0 || lnum > len + 1 {
                    return Ok(json!(1));
                }
                let lines = lines_arg(&args[2]);
                let end = (lnum - 1 + lines.len()).min(len);
                self.buffer_mut(bufnr)?.edit(lnum - 1, Some(end), lines)?;
                Ok(json!(0))
            }
            "deletebufline" => {
                arity(3)?;
                let bufnr = self.bufnr_arg(&args[0])?;
                let len = self.buffer(bufnr)?.lines.len();
                let first = lnum_arg(&args[1], len)?;
                let last = lnum_arg(&args[2], len)?.min(len);
                if first == 0 || first > last {
                    return Ok(json!(1));
                }
                self.buffer_mut(bufnr)?.edit(first - 1, Some(last), Vec::new())?;
                Ok(json!(0))
            }
            other => Err(format!("E117: Unknown function: {}", other)),
        }
    }

    fn bufnr_arg(&self, value: &Value) -> std::result::Result<BufNr, String> {
        match value {
            Value::String(s) if s == "%" => Ok(self.current_bufnr()),
            other => other
                .as_u64()
                .ok_or_else(|| format!("E86: Buffer {} does not exist", other)),
        }
    }
}

fn lnum_arg(value: &Value, len: usize) -> std::result::Result<usize, String> {
    match value {
        Value::String(s) if s == "$" => Ok(len),
        other => other
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| format!("E1030: Using a String as a Number: {}", other)),
    }
}

fn lines_arg(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(super::string_value).collect(),
        other => vec![super::string_value(other)],
    }
}

/// An in-memory editor host.
///
/// Starts like a fresh editor: one tab page, one window (id 1000) showing an
/// empty unnamed buffer 1.
///
/// # Example
///
/// ```
/// use bufsync::host::{HostSession, MemoryHost};
///
/// # tokio_test_block_on(async {
/// let host = MemoryHost::new();
/// host.execute("edit notes.txt").await.unwrap();
/// assert_eq!(host.buffer_name(host.buffer_number().await.unwrap()).await.unwrap(), "notes.txt");
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
pub struct MemoryHost {
    state: Mutex<HostState>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHost").finish_non_exhaustive()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HostState::new()),
        }
    }

    /// Put `lines` on the fake disk under `name`.
    ///
    /// Buffers created or reloaded for `name` afterwards read these lines.
    pub fn write_file<S: Into<String>>(
        &self,
        name: impl Into<String>,
        lines: impl IntoIterator<Item = S>,
    ) -> Result<()> {
        let mut state = self.lock_state()?;
        state
            .files
            .insert(name.into(), lines.into_iter().map(Into::into).collect());
        Ok(())
    }

    /// Number of windows in the current tab page.
    pub fn window_count(&self) -> Result<usize> {
        Ok(self.lock_state()?.tab().windows.len())
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, HostState>> {
        self.state
            .lock()
            .map_err(|e| BufsyncError::host("lock", format!("Host state poisoned: {}", e)))
    }

    fn with_state<T>(
        &self,
        call: &str,
        f: impl FnOnce(&mut HostState) -> std::result::Result<T, String>,
    ) -> Result<T> {
        let mut state = self.lock_state()?;
        f(&mut state).map_err(|message| BufsyncError::host(call, message))
    }
}

#[async_trait]
impl HostSession for MemoryHost {
    async fn buffer_number(&self) -> Result<BufNr> {
        self.with_state("buffer_number", |s| Ok(s.current_bufnr()))
    }

    async fn window_id(&self) -> Result<WinId> {
        self.with_state("window_id", |s| Ok(s.current_window().id))
    }

    async fn window_number(&self) -> Result<u32> {
        self.with_state("window_number", |s| Ok(s.tab().current as u32 + 1))
    }

    async fn tabpage_number(&self) -> Result<u32> {
        self.with_state("tabpage_number", |s| Ok(s.current_tab as u32 + 1))
    }

    async fn buffer_name(&self, bufnr: BufNr) -> Result<String> {
        self.with_state("buffer_name", |s| Ok(s.buffer(bufnr)?.name.clone()))
    }

    async fn find_buffer(&self, name: &str) -> Result<Option<BufNr>> {
        self.with_state("find_buffer", |s| Ok(s.find_buffer(name)))
    }

    async fn window_for_buffer(&self, bufnr: BufNr) -> Result<Option<WinId>> {
        self.with_state("window_for_buffer", |s| {
            Ok(s.tab()
                .windows
                .iter()
                .find(|w| w.bufnr == bufnr)
                .map(|w| w.id))
        })
    }

    async fn line_count(&self, bufnr: BufNr) -> Result<usize> {
        self.with_state("line_count", |s| Ok(s.buffer(bufnr)?.lines.len()))
    }

    async fn get_lines(
        &self,
        bufnr: BufNr,
        start: usize,
        end: Option<usize>,
    ) -> Result<Vec<String>> {
        self.with_state("get_lines", |s| {
            let lines = &s.buffer(bufnr)?.lines;
            let end = end.unwrap_or(lines.len());
            if start > end || end > lines.len() {
                return Err(format!(
                    "Index out of bounds: {}..{} of {}",
                    start,
                    end,
                    lines.len()
                ));
            }
            Ok(lines[start..end].to_vec())
        })
    }

    async fn set_lines(
        &self,
        bufnr: BufNr,
        start: usize,
        end: Option<usize>,
        lines: Vec<String>,
    ) -> Result<()> {
        self.with_state("set_lines", |s| s.buffer_mut(bufnr)?.edit(start, end, lines))
    }

    async fn execute(&self, command: &str) -> Result<()> {
        debug!("MemoryHost executing: {}", command);
        self.with_state("execute", |s| s.run_line(command, 0))
    }

    async fn get_var(&self, bufnr: BufNr, name: &str) -> Result<Value> {
        self.with_state("get_var", |s| s.get_var(bufnr, name))
    }

    async fn set_var(&self, bufnr: BufNr, name: &str, value: Value) -> Result<()> {
        self.with_state("set_var", |s| s.set_var(bufnr, name, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn lines(host: &MemoryHost, bufnr: BufNr) -> Vec<String> {
        host.get_lines(bufnr, 0, None).await.unwrap()
    }

    #[tokio::test]
    async fn test_edit_creates_and_reuses_buffers() {
        let host = MemoryHost::new();
        host.execute("edit foo").await.unwrap();
        let foo = host.buffer_number().await.unwrap();
        host.execute("edit bar").await.unwrap();
        host.execute("edit foo").await.unwrap();
        assert_eq!(host.buffer_number().await.unwrap(), foo);
        assert_eq!(host.find_buffer("bar").await.unwrap(), Some(foo + 1));
    }

    #[tokio::test]
    async fn test_edit_decodes_percent_escapes() {
        let host = MemoryHost::new();
        host.execute("edit a%20b%7cc%25").await.unwrap();
        let bufnr = host.buffer_number().await.unwrap();
        assert_eq!(host.buffer_name(bufnr).await.unwrap(), "a b|c%");
    }

    #[tokio::test]
    async fn test_buffer_keeps_one_line_minimum() {
        let host = MemoryHost::new();
        host.set_lines(1, 0, None, vec!["a".into(), "b".into()])
            .await
            .unwrap();
        host.set_lines(1, 0, None, Vec::new()).await.unwrap();
        assert_eq!(lines(&host, 1).await, vec![""]);
    }

    #[tokio::test]
    async fn test_nomodifiable_rejects_edits() {
        let host = MemoryHost::new();
        host.execute("setlocal nomodifiable").await.unwrap();
        let err = host
            .set_lines(1, 0, None, vec!["x".into()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("E21"));
        assert_eq!(host.get_var(1, "&modifiable").await.unwrap(), json!(0));
    }

    #[tokio::test]
    async fn test_reload_of_modified_buffer_needs_bang() {
        let host = MemoryHost::new();
        host.write_file("notes", ["on disk"]).unwrap();
        host.execute("edit notes").await.unwrap();
        let bufnr = host.buffer_number().await.unwrap();
        assert_eq!(lines(&host, bufnr).await, vec!["on disk"]);

        host.set_lines(bufnr, 0, None, vec!["edited".into()])
            .await
            .unwrap();
        let err = host.execute("edit").await.unwrap_err();
        assert!(err.to_string().contains("E37"));

        host.execute("edit!").await.unwrap();
        assert_eq!(lines(&host, bufnr).await, vec!["on disk"]);
    }

    #[tokio::test]
    async fn test_buf_read_cmd_replaces_disk_read() {
        let host = MemoryHost::new();
        host.execute("edit notes").await.unwrap();
        host.set_var(2, "saved", json!(["x", "y"])).await.unwrap();
        host.execute("augroup grp | augroup END").await.unwrap();
        host.execute(
            "autocmd grp BufReadCmd <buffer=2> call deletebufline(2, 1, '$') | call setbufline(2, 1, getbufvar(2, 'saved'))",
        )
        .await
        .unwrap();

        host.execute("edit").await.unwrap();
        assert_eq!(lines(&host, 2).await, vec!["x", "y"]);
        assert_eq!(host.get_var(2, "&modified").await.unwrap(), json!(0));

        host.execute("autocmd! grp * <buffer=2>").await.unwrap();
        host.execute("edit!").await.unwrap();
        assert_eq!(lines(&host, 2).await, vec![""]);
    }

    #[tokio::test]
    async fn test_windows_and_win_gotoid() {
        let host = MemoryHost::new();
        let first = host.window_id().await.unwrap();
        host.execute("new").await.unwrap();
        let second = host.window_id().await.unwrap();
        assert_ne!(first, second);
        assert_eq!(host.window_count().unwrap(), 2);
        assert_eq!(host.window_number().await.unwrap(), 1);

        host.execute(&format!("call win_gotoid({})", first))
            .await
            .unwrap();
        assert_eq!(host.window_id().await.unwrap(), first);
        assert_eq!(host.window_number().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_close_window() {
        let host = MemoryHost::new();
        let first = host.window_id().await.unwrap();
        host.execute("new").await.unwrap();
        let second = host.window_id().await.unwrap();

        host.execute("close").await.unwrap();
        assert_eq!(host.window_id().await.unwrap(), first);
        assert_eq!(host.window_count().unwrap(), 1);
        host.execute(&format!("call win_gotoid({})", second))
            .await
            .unwrap();
        assert_eq!(host.window_id().await.unwrap(), first);

        let err = host.execute("close").await.unwrap_err();
        assert!(err.to_string().contains("E444"));
    }

    #[tokio::test]
    async fn test_tabedit_switches_tab_page() {
        let host = MemoryHost::new();
        host.execute("tabedit other").await.unwrap();
        assert_eq!(host.tabpage_number().await.unwrap(), 2);
        let bufnr = host.buffer_number().await.unwrap();
        assert_eq!(host.buffer_name(bufnr).await.unwrap(), "other");
        // window_for_buffer only looks at the current tab page
        assert_eq!(host.window_for_buffer(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_option_and_buffer_errors() {
        let host = MemoryHost::new();
        assert!(host.get_var(1, "&nosuchoption").await.is_err());
        assert!(host.get_var(42, "x").await.is_err());
        let err = host.execute("buffer 42").await.unwrap_err();
        assert!(matches!(err, BufsyncError::HostCallFailed { ref call, .. } if call == "execute"));
    }

    #[tokio::test]
    async fn test_missing_variable_reads_empty_string() {
        let host = MemoryHost::new();
        assert_eq!(host.get_var(1, "unset").await.unwrap(), json!(""));
    }
}
