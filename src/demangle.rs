use std::borrow::Cow;


/// Demangle a symbol name, on a best-effort basis.
///
/// Rust mangling is attempted first, C++ second; a name that neither
/// scheme recognizes is returned unchanged.
#[cfg(feature = "demangle")]
pub(crate) fn maybe_demangle(name: &str) -> Cow<'_, str> {
    if let Ok(demangled) = rustc_demangle::try_demangle(name) {
        // Strip the trailing hash to match what users see in source
        // code.
        return Cow::Owned(format!("{demangled:#}"))
    }

    if let Ok(symbol) = cpp_demangle::Symbol::new(name) {
        if let Ok(demangled) = symbol.demangle(&cpp_demangle::DemangleOptions::default()) {
            return Cow::Owned(demangled)
        }
    }

    Cow::Borrowed(name)
}

#[cfg(not(feature = "demangle"))]
pub(crate) fn maybe_demangle(name: &str) -> Cow<'_, str> {
    Cow::Borrowed(name)
}
