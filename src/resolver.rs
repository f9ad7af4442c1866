// Host specifier -> single address, with the resolver's own error codes.

use std::ffi::{CStr, CString};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::ptr;

use thiserror::Error;
use tracing::debug;

/// Resolution failure as reported by the system resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("code={code} ({description})")]
pub struct ResolverError {
    pub code: i32,
    pub description: String,
}

impl ResolverError {
    fn from_gai(code: i32) -> Self {
        let description = if code == libc::EAI_SYSTEM {
            std::io::Error::last_os_error().to_string()
        } else {
            unsafe { CStr::from_ptr(libc::gai_strerror(code)) }
                .to_string_lossy()
                .into_owned()
        };
        Self { code, description }
    }
}

pub trait Resolve {
    /// Maps `host` to the first address the resolver returns.
    fn resolve(&self, host: &str) -> Result<IpAddr, ResolverError>;
}

/// Runs `resolver` on the blocking pool so a slow lookup never stalls the
/// runtime thread.
pub async fn resolve_blocking<R>(resolver: &R, host: &str) -> Result<IpAddr, ResolverError>
where
    R: Resolve + Clone + Send + 'static,
{
    let resolver = resolver.clone();
    let host = host.to_string();
    tokio::task::spawn_blocking(move || resolver.resolve(&host))
        .await
        .unwrap_or_else(|e| {
            Err(ResolverError {
                code: libc::EAI_FAIL,
                description: e.to_string(),
            })
        })
}

/// Resolver backed by the platform's `getaddrinfo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolve for SystemResolver {
    fn resolve(&self, host: &str) -> Result<IpAddr, ResolverError> {
        // Literal addresses never reach the resolver.
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(ip);
        }

        let name = CString::new(host).map_err(|_| ResolverError::from_gai(libc::EAI_NONAME))?;
        let list = AddrInfoList::lookup(&name)?;
        let ip = list.first_ip().ok_or_else(|| ResolverError::from_gai(libc::EAI_NONAME))?;
        debug!(host, %ip, "resolved host");
        Ok(ip)
    }
}

/// Owns a `getaddrinfo` result list and frees it on drop.
struct AddrInfoList(*mut libc::addrinfo);

impl AddrInfoList {
    fn lookup(name: &CStr) -> Result<Self, ResolverError> {
        let mut hints: libc::addrinfo = unsafe { std::mem::zeroed() };
        hints.ai_family = libc::AF_UNSPEC;
        hints.ai_socktype = libc::SOCK_STREAM;

        let mut res: *mut libc::addrinfo = ptr::null_mut();
        let rc = unsafe { libc::getaddrinfo(name.as_ptr(), ptr::null(), &hints, &mut res) };
        if rc != 0 {
            return Err(ResolverError::from_gai(rc));
        }
        Ok(Self(res))
    }

    /// First entry with an IPv4 or IPv6 address; later entries are not tried
    /// as connection alternatives.
    fn first_ip(&self) -> Option<IpAddr> {
        let mut cur = self.0;
        while !cur.is_null() {
            let entry = unsafe { &*cur };
            if let Some(ip) = unsafe { sockaddr_ip(entry) } {
                return Some(ip);
            }
            cur = entry.ai_next;
        }
        None
    }
}

impl Drop for AddrInfoList {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe { libc::freeaddrinfo(self.0) };
        }
    }
}

unsafe fn sockaddr_ip(entry: &libc::addrinfo) -> Option<IpAddr> {
    if entry.ai_addr.is_null() {
        return None;
    }
    match entry.ai_family {
        libc::AF_INET => {
            let sin = unsafe { &*(entry.ai_addr as *const libc::sockaddr_in) };
            Some(IpAddr::V4(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr))))
        }
        libc::AF_INET6 => {
            let sin6 = unsafe { &*(entry.ai_addr as *const libc::sockaddr_in6) };
            Some(IpAddr::V6(Ipv6Addr::from(sin6.sin6_addr.s6_addr)))
        }
        _ => None,
    }
}
