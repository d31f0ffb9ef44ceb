//! Native backend: runs the `git` executable inside a verified work tree.
//!
//! Every command inherits the directory checked by `NativeGit::verified`.
//! Standard output is consumed line by line and always drained completely
//! before the exit status is read, so large outputs cannot block the child.

use std::ffi::OsStr;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

use crate::error::{Result, ScmError};
use crate::git::RepositoryOps;
use crate::git::backend::GitExecutable;
use crate::git::changed_lines::ChangedLinesComputer;

pub struct NativeGit<'a> {
    program: &'a Path,
    work_dir: PathBuf,
}

impl<'a> NativeGit<'a> {
    /// Checks that `dir` is a directory inside a Git work tree before handing
    /// out a runner bound to it.
    pub fn verified(executable: &'a GitExecutable, dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(ScmError::not_a_work_tree(dir));
        }
        let git = Self {
            program: executable.verified()?,
            work_dir: dir.to_path_buf(),
        };
        match git.first_line(["rev-parse", "--is-inside-work-tree"]) {
            Ok(Some(answer)) if answer == "true" => Ok(git),
            Ok(_) => Err(ScmError::not_a_work_tree(dir)),
            Err(e) => {
                debug!("git rev-parse --is-inside-work-tree failed in {}: {}", dir.display(), e);
                Err(ScmError::not_a_work_tree(dir))
            }
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(self.program);
        cmd.args(args)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }

    /// Runs a command and hands its standard output to `consume`.
    ///
    /// Whatever `consume` leaves unread is drained before waiting on the
    /// process. A non-zero exit is an error even if `consume` succeeded.
    pub fn stream<I, S, T, F>(&self, args: I, consume: F) -> Result<T>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
        F: FnOnce(&mut dyn BufRead) -> Result<T>,
    {
        let args: Vec<S> = args.into_iter().collect();
        let described = describe(&args);
        let mut child = self.command(&args).stdout(Stdio::piped()).spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ScmError::Internal("child stdout was not captured".to_string()))?;

        let mut reader = BufReader::new(stdout);
        let consumed = consume(&mut reader);
        if let Err(e) = io::copy(&mut reader, &mut io::sink()) {
            warn!("Failed to drain output of git {}: {}", described, e);
        }
        let status = child.wait()?;

        let value = consumed?;
        if !status.success() {
            return Err(ScmError::CommandFailed {
                command: described,
                status: status.to_string(),
            });
        }
        Ok(value)
    }

    pub fn first_line<I, S>(&self, args: I) -> Result<Option<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.stream(args, |reader| {
            let mut buf = Vec::new();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                return Ok(None);
            }
            Ok(Some(decode_line(&buf)))
        })
    }

    /// Path argument for a file, relative to the runner's directory when possible.
    pub fn path_arg<'p>(&self, path: &'p Path) -> std::borrow::Cow<'p, str> {
        let relative = path.strip_prefix(&self.work_dir).unwrap_or(path);
        if cfg!(windows) {
            relative.to_string_lossy().replace('\\', "/").into()
        } else {
            relative.to_string_lossy()
        }
    }
}

impl RepositoryOps for NativeGit<'_> {
    fn work_tree(&self) -> Result<PathBuf> {
        let top = self
            .first_line(["rev-parse", "--show-toplevel"])?
            .ok_or_else(|| ScmError::not_a_work_tree(&self.work_dir))?;
        Ok(PathBuf::from(from_cygwin_path(&top)))
    }

    fn find_ref(&self, full_name: &str) -> Result<Option<String>> {
        let rev = format!("{}^{{commit}}", full_name);
        verify(self.first_line(["rev-parse", "--quiet", "--verify", rev.as_str()]))
    }

    fn head_oid(&self) -> Result<Option<String>> {
        verify(self.first_line(["rev-parse", "--quiet", "--verify", "HEAD^{commit}"]))
    }

    fn merge_base(&self, one: &str, two: &str) -> Result<Option<String>> {
        // exit status 1 with no output means the histories are unrelated
        match self.first_line(["merge-base", one, two]) {
            Ok(base) => Ok(base),
            Err(ScmError::CommandFailed { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn diff_names(&self, base: &str) -> Result<Vec<PathBuf>> {
        let top = self.work_tree()?;
        let names = self.stream(
            [
                "diff",
                "--no-color",
                "--no-ext-diff",
                "--no-textconv",
                "--name-only",
                "--no-renames",
                "--diff-filter=AM",
                "-z",
                base,
                "--",
            ],
            read_nul_separated,
        )?;
        Ok(names.into_iter().map(|name| top.join(name)).collect())
    }

    fn diff_file(&self, base: &str, path: &Path, computer: &mut ChangedLinesComputer) -> Result<()> {
        let path = self.path_arg(path);
        let args = ["diff", "--no-color", "--no-ext-diff", "--no-textconv", "-w", base, "--", &*path];
        self.stream(args, |reader| {
            io::copy(reader, &mut *computer)?;
            Ok(())
        })?;
        computer.finish();
        Ok(())
    }

    fn is_shallow(&self) -> Result<bool> {
        let answer = self.first_line(["rev-parse", "--is-shallow-repository"])?;
        Ok(answer.as_deref() == Some("true"))
    }

    fn included_files(&self) -> Result<Vec<PathBuf>> {
        // ls-files only lists below its working directory, so run it from the top
        let top = NativeGit {
            program: self.program,
            work_dir: self.work_tree()?,
        };
        let names = top.stream(["ls-files", "-c", "-o", "--exclude-standard", "-z"], read_nul_separated)?;
        Ok(names.into_iter().map(|name| top.work_dir.join(name)).collect())
    }
}

/// `rev-parse --verify` exits non-zero for names that do not resolve.
fn verify(answer: Result<Option<String>>) -> Result<Option<String>> {
    match answer {
        Ok(oid) => Ok(oid.filter(|oid| !oid.is_empty())),
        Err(ScmError::CommandFailed { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

fn describe<S: AsRef<OsStr>>(args: &[S]) -> String {
    args.iter()
        .map(|a| a.as_ref().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits `-z` output into names. Entries come back verbatim, without the
/// C-style quoting git applies to unusual paths in line mode.
fn read_nul_separated(reader: &mut dyn BufRead) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut buf = Vec::new();
    while reader.read_until(b'\0', &mut buf)? > 0 {
        if buf.last() == Some(&b'\0') {
            buf.pop();
        }
        if !buf.is_empty() {
            names.push(String::from_utf8_lossy(&buf).into_owned());
        }
        buf.clear();
    }
    Ok(names)
}

/// Strips the line terminator; invalid UTF-8 is replaced rather than rejected.
pub(crate) fn decode_line(buf: &[u8]) -> String {
    let mut end = buf.len();
    if end > 0 && buf[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && buf[end - 1] == b'\r' {
            end -= 1;
        }
    }
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// Maps a Cygwin `/cygdrive/c/...` root to `C:/...`.
fn from_cygwin_path(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("/cygdrive/") {
        let mut chars = rest.chars();
        if let Some(drive) = chars.next().filter(|c| c.is_ascii_alphabetic()) {
            let tail = chars.as_str();
            if tail.is_empty() || tail.starts_with('/') {
                return format!("{}:{}", drive.to_ascii_uppercase(), tail);
            }
        }
    }
    path.to_string()
}
