use bitflags::bitflags;

bitflags! {
    /// Access flags on methods
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.6-200-A.1
    pub struct MethodAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
    }
}

/// Keywords used for the flags in listings, in the order they are printed
pub const METHOD_FLAG_KEYWORDS: [(MethodAccessFlags, &str); 12] = [
    (MethodAccessFlags::PUBLIC, "public"),
    (MethodAccessFlags::PRIVATE, "private"),
    (MethodAccessFlags::PROTECTED, "protected"),
    (MethodAccessFlags::STATIC, "static"),
    (MethodAccessFlags::FINAL, "final"),
    (MethodAccessFlags::SYNCHRONIZED, "synchronized"),
    (MethodAccessFlags::BRIDGE, "bridge"),
    (MethodAccessFlags::VARARGS, "varargs"),
    (MethodAccessFlags::NATIVE, "native"),
    (MethodAccessFlags::ABSTRACT, "abstract"),
    (MethodAccessFlags::STRICT, "strict"),
    (MethodAccessFlags::SYNTHETIC, "synthetic"),
];

impl MethodAccessFlags {
    /// Look up a flag from its listing keyword
    pub fn from_keyword(keyword: &str) -> Option<MethodAccessFlags> {
        METHOD_FLAG_KEYWORDS
            .iter()
            .find(|(_, kw)| *kw == keyword)
            .map(|(flag, _)| *flag)
    }

    /// Listing keywords for the flags that are set
    pub fn keywords(&self) -> impl Iterator<Item = &'static str> + '_ {
        METHOD_FLAG_KEYWORDS
            .iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, kw)| *kw)
    }
}
