//! Second-level registry table for registrable-domain splitting
//!
//! A full Public Suffix List is not needed to decide which part of a host is
//! the "domain" a rule is keyed on. A short list of generic second-level
//! labels plus a per-TLD table of well known registry labels gives the same
//! boundary for the hosts that matter in practice.
//!
//! # Examples
//!
//! ```
//! use sj_core::psl::split_host;
//!
//! assert_eq!(split_host("static.cdn.example.com"), ("static.cdn", "example.com"));
//! assert_eq!(split_host("news.bbc.co.uk"), ("news", "bbc.co.uk"));
//! assert_eq!(split_host("example.com"), ("", "example.com"));
//! ```

/// Generic top-level label that never has registry second levels.
const GENERIC_TLD: &str = "com";

/// Second-level labels recognized under any top-level label (sorted).
const STANDARD_SECOND_LEVEL: &[&str] = &[
    "ac", "asso", "biz", "co", "com", "edu", "gob", "gov", "info", "int", "mil",
    "net", "nom", "or", "org", "sch", "tm",
];

/// Registry second-level labels for a specific top-level label (sorted).
///
/// Omits the labels already in [`STANDARD_SECOND_LEVEL`].
fn registry_labels(tld: &str) -> &'static [&'static str] {
    match tld {
        "aero" => &["caa", "club", "crew", "dgca", "fuel", "res", "show", "taxi"],
        "ai" => &["off"],
        "ao" => &["ed", "gv", "it", "og", "pb"],
        "ar" => &["tur"],
        "arpa" => &["e164", "ip6", "iris", "uri", "urn"],
        "at" => &["gv", "priv"],
        "au" => &[
            "act", "asn", "conf", "id", "nsw", "nt", "oz", "qld", "sa", "tas",
            "vic", "wa",
        ],
        "az" => &["name", "pp", "pro"],
        "ba" => &["rs", "unbi", "unsa"],
        "bb" => &["store", "tv"],
        "bg" => &[
            "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "a", "b", "c", "d",
            "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r",
            "s", "t", "u", "v", "w", "x", "y", "z",
        ],
        "bj" => &["barreau", "gouv"],
        "bo" => &["tv"],
        "br" => &[
            "adm", "adv", "agr", "am", "arq", "art", "ato", "b", "bio", "blog",
            "bmd", "cim", "cng", "cnt", "coop", "ecn", "eco", "emp", "eng",
            "esp", "etc", "eti", "far", "flog", "fm", "fnd", "fot", "fst", "g12",
            "ggf", "imb", "ind", "inf", "jor", "jus", "leg", "lel", "mat", "med",
            "mp", "mus", "nom", "not", "ntr", "odo", "ppg", "pro", "psc", "psi",
            "qsl", "radio", "rec", "slg", "srv", "taxi", "teo", "tmp", "trd",
            "tur", "tv", "vet", "vlog", "wiki", "zlg",
        ],
        "by" => &["of"],
        "ca" => &[
            "ab", "bc", "gc", "mb", "nb", "nf", "nl", "ns", "nt", "nu", "on",
            "pe", "qc", "sk", "yk",
        ],
        "ci" => &["ed", "go", "gouv", "md", "presse"],
        "cn" => &[
            "ah", "bj", "cq", "fj", "gd", "gs", "gx", "gz", "ha", "hb", "he",
            "hi", "hk", "hl", "hn", "jl", "js", "jx", "ln", "mo", "nm", "nx",
            "qh", "sc", "sd", "sh", "sn", "sx", "tj", "tw", "xj", "xz", "yn",
            "zj",
        ],
        "co" => &["arts", "firm", "rec", "web"],
        "cr" => &["ed", "fi", "go", "sa"],
        "cu" => &["inf"],
        "cx" => &["ath"],
        "cy" => &["ltd", "name", "press", "pro"],
        "do" => &["art", "sld", "web"],
        "dz" => &["art", "pol"],
        "ec" => &["fin", "k12", "med", "pro"],
        "ee" => &["aip", "fie", "lib", "med", "pri", "riik"],
        "eg" => &["eun", "name", "sci"],
        "et" => &["name"],
        "fi" => &["aland", "iki"],
        "fr" => &["cci", "gouv", "port", "prd"],
        "ge" => &["pvt"],
        "gi" => &["ltd", "mod"],
        "gp" => &["mobi"],
        "gt" => &["ind"],
        "hk" => &["idv"],
        "hr" => &["from", "iz", "name"],
        "ht" => &["art", "coop", "firm", "gouv", "med", "pol", "pro", "rel", "shop"],
        "hu" => &[
            "2000", "bolt", "city", "film", "news", "priv", "sex", "shop",
            "suli", "szex",
        ],
        "id" => &["go", "my", "web"],
        "im" => &["nic"],
        "in" => &["firm", "gen", "ind", "nic", "res"],
        "int" => &["eu"],
        "ir" => &["id"],
        "it" => &[
            "ag", "al", "an", "ao", "ap", "aq", "ar", "asti", "at", "av", "ba",
            "bari", "bg", "bi", "bl", "bn", "bo", "br", "bs", "bt", "bz", "ca",
            "cb", "ce", "ch", "ci", "cl", "cn", "como", "cr", "cs", "ct", "cz",
            "en", "enna", "fc", "fe", "fg", "fi", "fm", "fr", "ge", "go", "gr",
            "im", "is", "kr", "lc", "le", "li", "lo", "lodi", "lt", "lu", "mb",
            "mc", "me", "mi", "mn", "mo", "ms", "mt", "na", "no", "nu", "og",
            "ot", "pa", "pc", "pd", "pe", "pg", "pi", "pisa", "pn", "po", "pr",
            "pt", "pu", "pv", "pz", "ra", "rc", "re", "rg", "ri", "rm", "rn",
            "ro", "roma", "rome", "sa", "si", "so", "sp", "sr", "ss", "sv", "ta",
            "te", "tn", "to", "tp", "tr", "ts", "tv", "ud", "va", "vb", "vc",
            "ve", "vi", "vr", "vs", "vt", "vv",
        ],
        "jo" => &["name"],
        "jp" => &[
            "ad", "ed", "gifu", "go", "gr", "lg", "mie", "nara", "ne", "oita",
            "saga",
        ],
        "km" => &["ass", "coop", "gouv", "prd"],
        "kp" => &["rep", "tra"],
        "kr" => &["es", "go", "hs", "jeju", "kg", "ms", "ne", "pe", "re", "sc"],
        "la" => &["c", "per"],
        "lk" => &["assn", "grp", "ltd", "ngo", "soc", "web"],
        "lv" => &["asn", "conf", "id"],
        "ly" => &["id", "med", "plc"],
        "me" => &["its", "priv"],
        "mg" => &["prd"],
        "mk" => &["inf", "name"],
        "ml" => &["gouv"],
        "mn" => &["nyc"],
        "museum" => &[
            "air", "and", "art", "arts", "axis", "bahn", "bale", "bern", "bill",
            "bonn", "bus", "can", "coal", "cody", "dali", "ddr", "farm", "film",
            "frog", "glas", "graz", "iraq", "iron", "jfk", "juif", "kids",
            "lans", "linz", "mad", "manx", "mill", "moma", "nrw", "nyc", "nyny",
            "roma", "satx", "silk", "ski", "spy", "tank", "tcm", "time", "town",
            "tree", "ulm", "usa", "utah", "uvic", "war", "york",
        ],
        "mv" => &["aero", "coop", "name", "pro"],
        "mw" => &["coop"],
        "my" => &["name"],
        "na" => &[
            "ca", "cc", "dr", "in", "mobi", "mx", "name", "pro", "tv", "us",
            "ws",
        ],
        "net" => &["gb", "hu", "jp", "se", "uk", "za"],
        "nf" => &["arts", "firm", "per", "rec", "web"],
        "nl" => &["bv"],
        "no" => &[
            "aa", "ah", "al", "alta", "amli", "amot", "arna", "aure", "berg",
            "bodo", "bokn", "bu", "dep", "eid", "etne", "fet", "fhs", "fla",
            "flå", "fm", "frei", "fusa", "gol", "gran", "grue", "ha", "hl", "hm",
            "hof", "hol", "hole", "hå", "ivgu", "kvam", "leka", "lier", "lom",
            "lund", "moss", "mr", "nl", "nt", "odda", "of", "ol", "osen", "oslo",
            "oyer", "priv", "rade", "rana", "rl", "roan", "rost", "sel", "sf",
            "ski", "sola", "st", "stat", "sula", "sund", "tana", "time", "tinn",
            "tr", "va", "vaga", "vang", "vega", "vf", "vgs", "vik", "voss", "ål",
            "ås",
        ],
        "nu" => &["mine"],
        "org" => &["ae", "us", "za"],
        "pa" => &["abo", "ing", "med", "sld"],
        "ph" => &["i", "ngo"],
        "pk" => &["fam", "gok", "gon", "gop", "gos", "web"],
        "pl" => &[
            "agro", "aid", "art", "atm", "auto", "elk", "gda", "gsm", "irc",
            "lapy", "mail", "med", "ngo", "nysa", "pc", "pila", "pisz", "priv",
            "rel", "sex", "shop", "sos", "waw", "wroc",
        ],
        "pr" => &["est", "isla", "name", "pro", "prof"],
        "pro" => &["aca", "bar", "cpa", "eng", "jur", "law", "med"],
        "ps" => &["plo", "sec"],
        "pt" => &["nome", "publ"],
        "pw" => &["ed", "go", "ne"],
        "py" => &["coop"],
        "qa" => &["name"],
        "ro" => &["arts", "firm", "nt", "rec", "www"],
        "rs" => &["in"],
        "ru" => &[
            "amur", "bir", "cbg", "chel", "cmw", "jar", "kchr", "khv", "kms",
            "komi", "mari", "msk", "nkz", "nnov", "nov", "nsk", "omsk", "perm",
            "pp", "ptz", "rnd", "snz", "spb", "stv", "test", "tom", "tsk",
            "tula", "tuva", "tver", "udm", "vrn",
        ],
        "rw" => &["gouv"],
        "sa" => &["med", "pub"],
        "sd" => &["med", "tv"],
        "se" => &[
            "a", "b", "bd", "c", "d", "e", "f", "fh", "fhsk", "fhv", "g", "h",
            "i", "k", "l", "m", "n", "o", "p", "pp", "r", "s", "sshn", "t", "u",
            "w", "x", "y", "z",
        ],
        "sg" => &["per"],
        "sn" => &["art", "gouv", "univ"],
        "th" => &["go", "in", "mi"],
        "tj" => &["go", "name", "nic", "test", "web"],
        "tn" => &["ens", "fin", "ind", "intl", "nat", "rnrt", "rns", "rnu"],
        "tt" => &["aero", "coop", "jobs", "mobi", "name", "pro"],
        "tw" => &["club", "ebiz", "game", "idv"],
        "tz" => &["go", "me", "mobi", "ne", "sc", "tv"],
        "ua" => &[
            "ck", "cn", "cr", "cv", "dn", "dp", "if", "in", "kh", "kiev", "km",
            "kr", "krym", "ks", "kv", "kyiv", "lg", "lt", "lv", "lviv", "mk",
            "od", "pl", "pp", "rv", "sb", "sm", "sumy", "te", "uz", "vn", "zp",
            "zt",
        ],
        "ug" => &["go", "ne", "sc"],
        "us" => &[
            "ak", "al", "ar", "as", "az", "ca", "ct", "dc", "de", "dni", "fed",
            "fl", "ga", "gu", "hi", "ia", "id", "il", "in", "isa", "kids", "ks",
            "ky", "la", "ma", "md", "me", "mi", "mn", "mo", "ms", "mt", "nc",
            "nd", "ne", "nh", "nj", "nm", "nsn", "nv", "ny", "oh", "ok", "pa",
            "pr", "ri", "sc", "sd", "tn", "tx", "ut", "va", "vi", "vt", "wa",
            "wi", "wv", "wy",
        ],
        "uy" => &["gub"],
        "ve" => &["e12", "web"],
        "vi" => &["k12"],
        "vn" => &["name", "pro"],
        _ => &[],
    }
}

/// Check if `sld` is a registry label under `tld`, making `sld.tld` a public
/// suffix rather than a registrable domain.
#[inline]
pub fn is_registry_label(tld: &str, sld: &str) -> bool {
    if tld == GENERIC_TLD {
        return false;
    }
    STANDARD_SECOND_LEVEL.binary_search(&sld).is_ok()
        || registry_labels(tld).binary_search(&sld).is_ok()
}

/// Number of trailing labels that form the registrable domain of a host
/// with `labels` labels.
fn domain_label_count(labels: &[&str]) -> usize {
    let n = labels.len();
    if n < 3 {
        return n;
    }
    if is_registry_label(labels[n - 1], labels[n - 2]) {
        3
    } else {
        2
    }
}

/// Split a lowercase hostname into `(subdomain, domain)`.
///
/// Hosts with fewer than three labels are all domain. Otherwise the last two
/// labels are the domain, or the last three when the second-level label is a
/// registry label. Both parts borrow from `host`.
pub fn split_host(host: &str) -> (&str, &str) {
    let labels: Vec<&str> = host.split('.').collect();
    let keep = domain_label_count(&labels);
    let skip = labels.len() - keep;
    if skip == 0 {
        return ("", host);
    }

    // byte offset of the first domain label
    let offset = labels[..skip].iter().map(|l| l.len() + 1).sum::<usize>();
    (&host[..offset - 1], &host[offset..])
}

/// Get the registrable domain of a hostname.
#[inline]
pub fn registrable_domain(host: &str) -> &str {
    split_host(host).1
}

/// Check if two hosts share the same registrable domain.
pub fn is_same_site(host1: &str, host2: &str) -> bool {
    registrable_domain(host1) == registrable_domain(host2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_sorted() {
        assert!(STANDARD_SECOND_LEVEL.windows(2).all(|w| w[0] < w[1]));
        for tld in ["br", "it", "no", "us", "jp", "se"] {
            let labels = registry_labels(tld);
            assert!(labels.windows(2).all(|w| w[0] < w[1]), "{tld} not sorted");
        }
    }

    #[test]
    fn test_split_simple() {
        assert_eq!(split_host("example.com"), ("", "example.com"));
        assert_eq!(split_host("www.example.com"), ("www", "example.com"));
        assert_eq!(split_host("a.b.example.org"), ("a.b", "example.org"));
        assert_eq!(split_host("localhost"), ("", "localhost"));
    }

    #[test]
    fn test_split_standard_second_level() {
        assert_eq!(split_host("example.co.uk"), ("", "example.co.uk"));
        assert_eq!(split_host("www.example.co.uk"), ("www", "example.co.uk"));
        assert_eq!(split_host("sina.com.cn"), ("", "sina.com.cn"));
        assert_eq!(split_host("d1.sina.com.cn"), ("d1", "sina.com.cn"));
    }

    #[test]
    fn test_split_per_tld_registry() {
        // "ne" is a registry label under jp but not under uk
        assert_eq!(split_host("www.example.ne.jp"), ("www", "example.ne.jp"));
        assert_eq!(split_host("www.example.ne.uk"), ("www.example", "ne.uk"));
        assert_eq!(split_host("shop.example.blog.br"), ("shop", "example.blog.br"));
    }

    #[test]
    fn test_generic_tld_never_promoted() {
        // "co" would be promoted under any other top-level label
        assert_eq!(split_host("www.co.com"), ("www", "co.com"));
        assert!(!is_registry_label("com", "co"));
        assert!(is_registry_label("uk", "co"));
    }

    #[test]
    fn test_is_same_site() {
        assert!(is_same_site("a.example.com", "b.example.com"));
        assert!(!is_same_site("a.example.co.uk", "a.other.co.uk"));
    }
}
