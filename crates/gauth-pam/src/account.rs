//! Target-account lookup via the system password database

use std::ffi::{CStr, CString};
use std::mem;
use std::path::PathBuf;
use std::ptr;

use crate::error::{PamError, Result};

/// The account a verification runs against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub username: String,
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
}

impl Account {
    /// Look an account up by name, falling back to treating a numeric
    /// name as a uid.
    pub fn lookup(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(PamError::UnknownUser(String::new()));
        }
        if let Some(account) = lookup_by_name(name) {
            return Ok(account);
        }
        if let Ok(uid) = name.parse::<u32>() {
            if let Some(account) = lookup_by_uid(uid) {
                return Ok(account);
            }
        }
        Err(PamError::UnknownUser(name.to_string()))
    }

    /// The account of the effective uid of this process.
    pub fn current() -> Result<Self> {
        let uid = unsafe { libc::geteuid() };
        lookup_by_uid(uid).ok_or_else(|| PamError::UnknownUser(format!("uid {uid}")))
    }
}

fn lookup_by_name(name: &str) -> Option<Account> {
    let cname = CString::new(name).ok()?;
    getpw(|pwd, buf, len, result| unsafe {
        libc::getpwnam_r(cname.as_ptr(), pwd, buf, len, result)
    })
}

fn lookup_by_uid(uid: u32) -> Option<Account> {
    getpw(|pwd, buf, len, result| unsafe { libc::getpwuid_r(uid, pwd, buf, len, result) })
}

fn getpw<F>(mut call: F) -> Option<Account>
where
    F: FnMut(
        *mut libc::passwd,
        *mut libc::c_char,
        libc::size_t,
        *mut *mut libc::passwd,
    ) -> libc::c_int,
{
    let mut pwd: libc::passwd = unsafe { mem::zeroed() };
    let mut buf = vec![0u8; 1024];
    loop {
        let mut result: *mut libc::passwd = ptr::null_mut();
        let rc = call(
            &mut pwd,
            buf.as_mut_ptr().cast(),
            buf.len(),
            &mut result,
        );
        if rc == libc::ERANGE {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 || result.is_null() {
            return None;
        }
        let username = unsafe { CStr::from_ptr(pwd.pw_name) }
            .to_string_lossy()
            .into_owned();
        let home = unsafe { CStr::from_ptr(pwd.pw_dir) }
            .to_string_lossy()
            .into_owned();
        return Some(Account {
            username,
            uid: pwd.pw_uid,
            gid: pwd.pw_gid,
            home: PathBuf::from(home),
        });
    }
}
