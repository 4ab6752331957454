//! The fixed route table of the volume plugin protocol.
//!
//! Every logical operation maps to exactly one HTTP method and path.
//! The table is closed: both the invoking side and the serving side
//! look routes up here and nowhere else.
use hyper::Method;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Activate,
    Create,
    Get,
    List,
    Mount,
    Path,
    Remove,
    Unmount,
    Capabilities,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown plugin route: '{0}'")]
pub struct UnknownRoute(pub String);

impl Route {
    pub const ALL: [Route; 9] = [
        Route::Activate,
        Route::Create,
        Route::Get,
        Route::List,
        Route::Mount,
        Route::Path,
        Route::Remove,
        Route::Unmount,
        Route::Capabilities,
    ];

    /// HTTP method used to invoke the route. The protocol only uses POST.
    pub fn method(self) -> Method {
        Method::POST
    }

    pub const fn path(self) -> &'static str {
        match self {
            Route::Activate => "/Plugin.Activate",
            Route::Create => "/VolumeDriver.Create",
            Route::Get => "/VolumeDriver.Get",
            Route::List => "/VolumeDriver.List",
            Route::Mount => "/VolumeDriver.Mount",
            Route::Path => "/VolumeDriver.Path",
            Route::Remove => "/VolumeDriver.Remove",
            Route::Unmount => "/VolumeDriver.Unmount",
            Route::Capabilities => "/VolumeDriver.Capabilities",
        }
    }

    /// Operation name of the route, e.g. `mount`.
    pub const fn name(self) -> &'static str {
        match self {
            Route::Activate => "activate",
            Route::Create => "create",
            Route::Get => "get",
            Route::List => "list",
            Route::Mount => "mount",
            Route::Path => "path",
            Route::Remove => "remove",
            Route::Unmount => "unmount",
            Route::Capabilities => "capabilities",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.path() == path)
    }

    /// Looks a route up by operation name.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not one of the nine protocol operations. Route
    /// names are fixed at compile time, so an unknown name is a bug in the caller.
    pub fn named(name: &str) -> Self {
        match name.parse() {
            Ok(route) => route,
            Err(e) => panic!("{}", e),
        }
    }
}

impl FromStr for Route {
    type Err = UnknownRoute;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.name() == s)
            .ok_or_else(|| UnknownRoute(s.to_string()))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.path())
    }
}
