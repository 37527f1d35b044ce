use std::collections::BTreeMap;
use std::sync::OnceLock;

use super::model::CellValue;
use super::table::Table;

// ---------------------------------------------------------------------------
// ISO 3166-1 registry
// ---------------------------------------------------------------------------

/// One ISO 3166-1 entry: alpha-2, alpha-3, short name, other official or
/// common names.
struct Country {
    alpha2: &'static str,
    alpha3: &'static str,
    name: &'static str,
    aliases: &'static [&'static str],
}

const fn c(alpha2: &'static str, alpha3: &'static str, name: &'static str) -> Country {
    Country { alpha2, alpha3, name, aliases: &[] }
}

const fn ca(
    alpha2: &'static str,
    alpha3: &'static str,
    name: &'static str,
    aliases: &'static [&'static str],
) -> Country {
    Country { alpha2, alpha3, name, aliases }
}

#[rustfmt::skip]
static REGISTRY: &[Country] = &[
    c("AF", "AFG", "Afghanistan"),
    c("AX", "ALA", "Åland Islands"),
    c("AL", "ALB", "Albania"),
    c("DZ", "DZA", "Algeria"),
    c("AS", "ASM", "American Samoa"),
    c("AD", "AND", "Andorra"),
    c("AO", "AGO", "Angola"),
    c("AI", "AIA", "Anguilla"),
    c("AQ", "ATA", "Antarctica"),
    c("AG", "ATG", "Antigua and Barbuda"),
    c("AR", "ARG", "Argentina"),
    c("AM", "ARM", "Armenia"),
    c("AW", "ABW", "Aruba"),
    c("AU", "AUS", "Australia"),
    c("AT", "AUT", "Austria"),
    c("AZ", "AZE", "Azerbaijan"),
    c("BS", "BHS", "Bahamas"),
    c("BH", "BHR", "Bahrain"),
    c("BD", "BGD", "Bangladesh"),
    c("BB", "BRB", "Barbados"),
    c("BY", "BLR", "Belarus"),
    c("BE", "BEL", "Belgium"),
    c("BZ", "BLZ", "Belize"),
    c("BJ", "BEN", "Benin"),
    c("BM", "BMU", "Bermuda"),
    c("BT", "BTN", "Bhutan"),
    ca("BO", "BOL", "Bolivia, Plurinational State of", &["Plurinational State of Bolivia", "Bolivia"]),
    c("BQ", "BES", "Bonaire, Sint Eustatius and Saba"),
    c("BA", "BIH", "Bosnia and Herzegovina"),
    c("BW", "BWA", "Botswana"),
    c("BV", "BVT", "Bouvet Island"),
    c("BR", "BRA", "Brazil"),
    c("IO", "IOT", "British Indian Ocean Territory"),
    c("BN", "BRN", "Brunei Darussalam"),
    c("BG", "BGR", "Bulgaria"),
    c("BF", "BFA", "Burkina Faso"),
    c("BI", "BDI", "Burundi"),
    ca("CV", "CPV", "Cabo Verde", &["Republic of Cabo Verde"]),
    c("KH", "KHM", "Cambodia"),
    c("CM", "CMR", "Cameroon"),
    c("CA", "CAN", "Canada"),
    c("KY", "CYM", "Cayman Islands"),
    c("CF", "CAF", "Central African Republic"),
    c("TD", "TCD", "Chad"),
    c("CL", "CHL", "Chile"),
    ca("CN", "CHN", "China", &["People's Republic of China"]),
    c("CX", "CXR", "Christmas Island"),
    c("CC", "CCK", "Cocos (Keeling) Islands"),
    c("CO", "COL", "Colombia"),
    c("KM", "COM", "Comoros"),
    c("CG", "COG", "Congo"),
    c("CD", "COD", "Congo, The Democratic Republic of the"),
    c("CK", "COK", "Cook Islands"),
    c("CR", "CRI", "Costa Rica"),
    ca("CI", "CIV", "Côte d'Ivoire", &["Republic of Côte d'Ivoire"]),
    c("HR", "HRV", "Croatia"),
    c("CU", "CUB", "Cuba"),
    c("CW", "CUW", "Curaçao"),
    c("CY", "CYP", "Cyprus"),
    ca("CZ", "CZE", "Czechia", &["Czech Republic"]),
    c("DK", "DNK", "Denmark"),
    c("DJ", "DJI", "Djibouti"),
    c("DM", "DMA", "Dominica"),
    c("DO", "DOM", "Dominican Republic"),
    c("EC", "ECU", "Ecuador"),
    c("EG", "EGY", "Egypt"),
    c("SV", "SLV", "El Salvador"),
    c("GQ", "GNQ", "Equatorial Guinea"),
    c("ER", "ERI", "Eritrea"),
    c("EE", "EST", "Estonia"),
    ca("SZ", "SWZ", "Eswatini", &["Kingdom of Eswatini"]),
    c("ET", "ETH", "Ethiopia"),
    c("FK", "FLK", "Falkland Islands (Malvinas)"),
    c("FO", "FRO", "Faroe Islands"),
    c("FJ", "FJI", "Fiji"),
    c("FI", "FIN", "Finland"),
    c("FR", "FRA", "France"),
    c("GF", "GUF", "French Guiana"),
    c("PF", "PYF", "French Polynesia"),
    c("TF", "ATF", "French Southern Territories"),
    c("GA", "GAB", "Gabon"),
    c("GM", "GMB", "Gambia"),
    c("GE", "GEO", "Georgia"),
    c("DE", "DEU", "Germany"),
    c("GH", "GHA", "Ghana"),
    c("GI", "GIB", "Gibraltar"),
    c("GR", "GRC", "Greece"),
    c("GL", "GRL", "Greenland"),
    c("GD", "GRD", "Grenada"),
    c("GP", "GLP", "Guadeloupe"),
    c("GU", "GUM", "Guam"),
    c("GT", "GTM", "Guatemala"),
    c("GG", "GGY", "Guernsey"),
    c("GN", "GIN", "Guinea"),
    c("GW", "GNB", "Guinea-Bissau"),
    c("GY", "GUY", "Guyana"),
    c("HT", "HTI", "Haiti"),
    c("HM", "HMD", "Heard Island and McDonald Islands"),
    c("VA", "VAT", "Holy See (Vatican City State)"),
    c("HN", "HND", "Honduras"),
    c("HK", "HKG", "Hong Kong"),
    c("HU", "HUN", "Hungary"),
    c("IS", "ISL", "Iceland"),
    c("IN", "IND", "India"),
    c("ID", "IDN", "Indonesia"),
    ca("IR", "IRN", "Iran, Islamic Republic of", &["Islamic Republic of Iran", "Iran"]),
    c("IQ", "IRQ", "Iraq"),
    c("IE", "IRL", "Ireland"),
    c("IM", "IMN", "Isle of Man"),
    c("IL", "ISR", "Israel"),
    c("IT", "ITA", "Italy"),
    c("JM", "JAM", "Jamaica"),
    c("JP", "JPN", "Japan"),
    c("JE", "JEY", "Jersey"),
    c("JO", "JOR", "Jordan"),
    c("KZ", "KAZ", "Kazakhstan"),
    c("KE", "KEN", "Kenya"),
    c("KI", "KIR", "Kiribati"),
    ca("KP", "PRK", "Korea, Democratic People's Republic of", &["Democratic People's Republic of Korea", "North Korea"]),
    ca("KR", "KOR", "Korea, Republic of", &["Republic of Korea", "South Korea"]),
    c("KW", "KWT", "Kuwait"),
    c("KG", "KGZ", "Kyrgyzstan"),
    ca("LA", "LAO", "Lao People's Democratic Republic", &["Laos"]),
    c("LV", "LVA", "Latvia"),
    c("LB", "LBN", "Lebanon"),
    c("LS", "LSO", "Lesotho"),
    c("LR", "LBR", "Liberia"),
    c("LY", "LBY", "Libya"),
    c("LI", "LIE", "Liechtenstein"),
    c("LT", "LTU", "Lithuania"),
    c("LU", "LUX", "Luxembourg"),
    c("MO", "MAC", "Macao"),
    c("MG", "MDG", "Madagascar"),
    c("MW", "MWI", "Malawi"),
    c("MY", "MYS", "Malaysia"),
    c("MV", "MDV", "Maldives"),
    c("ML", "MLI", "Mali"),
    c("MT", "MLT", "Malta"),
    c("MH", "MHL", "Marshall Islands"),
    c("MQ", "MTQ", "Martinique"),
    c("MR", "MRT", "Mauritania"),
    c("MU", "MUS", "Mauritius"),
    c("YT", "MYT", "Mayotte"),
    c("MX", "MEX", "Mexico"),
    ca("FM", "FSM", "Micronesia, Federated States of", &["Federated States of Micronesia"]),
    ca("MD", "MDA", "Moldova, Republic of", &["Republic of Moldova", "Moldova"]),
    c("MC", "MCO", "Monaco"),
    c("MN", "MNG", "Mongolia"),
    c("ME", "MNE", "Montenegro"),
    c("MS", "MSR", "Montserrat"),
    c("MA", "MAR", "Morocco"),
    c("MZ", "MOZ", "Mozambique"),
    c("MM", "MMR", "Myanmar"),
    c("NA", "NAM", "Namibia"),
    c("NR", "NRU", "Nauru"),
    c("NP", "NPL", "Nepal"),
    c("NL", "NLD", "Netherlands"),
    c("NC", "NCL", "New Caledonia"),
    c("NZ", "NZL", "New Zealand"),
    c("NI", "NIC", "Nicaragua"),
    c("NE", "NER", "Niger"),
    c("NG", "NGA", "Nigeria"),
    c("NU", "NIU", "Niue"),
    c("NF", "NFK", "Norfolk Island"),
    ca("MK", "MKD", "North Macedonia", &["Republic of North Macedonia"]),
    c("MP", "MNP", "Northern Mariana Islands"),
    c("NO", "NOR", "Norway"),
    c("OM", "OMN", "Oman"),
    c("PK", "PAK", "Pakistan"),
    c("PW", "PLW", "Palau"),
    ca("PS", "PSE", "Palestine, State of", &["State of Palestine"]),
    c("PA", "PAN", "Panama"),
    c("PG", "PNG", "Papua New Guinea"),
    c("PY", "PRY", "Paraguay"),
    c("PE", "PER", "Peru"),
    c("PH", "PHL", "Philippines"),
    c("PN", "PCN", "Pitcairn"),
    c("PL", "POL", "Poland"),
    c("PT", "PRT", "Portugal"),
    c("PR", "PRI", "Puerto Rico"),
    c("QA", "QAT", "Qatar"),
    c("RE", "REU", "Réunion"),
    c("RO", "ROU", "Romania"),
    c("RU", "RUS", "Russian Federation"),
    c("RW", "RWA", "Rwanda"),
    c("BL", "BLM", "Saint Barthélemy"),
    c("SH", "SHN", "Saint Helena, Ascension and Tristan da Cunha"),
    c("KN", "KNA", "Saint Kitts and Nevis"),
    c("LC", "LCA", "Saint Lucia"),
    c("MF", "MAF", "Saint Martin (French part)"),
    c("PM", "SPM", "Saint Pierre and Miquelon"),
    c("VC", "VCT", "Saint Vincent and the Grenadines"),
    c("WS", "WSM", "Samoa"),
    c("SM", "SMR", "San Marino"),
    c("ST", "STP", "Sao Tome and Principe"),
    c("SA", "SAU", "Saudi Arabia"),
    c("SN", "SEN", "Senegal"),
    c("RS", "SRB", "Serbia"),
    c("SC", "SYC", "Seychelles"),
    c("SL", "SLE", "Sierra Leone"),
    c("SG", "SGP", "Singapore"),
    c("SX", "SXM", "Sint Maarten (Dutch part)"),
    c("SK", "SVK", "Slovakia"),
    c("SI", "SVN", "Slovenia"),
    c("SB", "SLB", "Solomon Islands"),
    c("SO", "SOM", "Somalia"),
    c("ZA", "ZAF", "South Africa"),
    c("GS", "SGS", "South Georgia and the South Sandwich Islands"),
    c("SS", "SSD", "South Sudan"),
    c("ES", "ESP", "Spain"),
    c("LK", "LKA", "Sri Lanka"),
    c("SD", "SDN", "Sudan"),
    c("SR", "SUR", "Suriname"),
    c("SJ", "SJM", "Svalbard and Jan Mayen"),
    c("SE", "SWE", "Sweden"),
    c("CH", "CHE", "Switzerland"),
    ca("SY", "SYR", "Syrian Arab Republic", &["Syria"]),
    ca("TW", "TWN", "Taiwan, Province of China", &["Taiwan"]),
    c("TJ", "TJK", "Tajikistan"),
    ca("TZ", "TZA", "Tanzania, United Republic of", &["United Republic of Tanzania", "Tanzania"]),
    c("TH", "THA", "Thailand"),
    c("TL", "TLS", "Timor-Leste"),
    c("TG", "TGO", "Togo"),
    c("TK", "TKL", "Tokelau"),
    c("TO", "TON", "Tonga"),
    c("TT", "TTO", "Trinidad and Tobago"),
    c("TN", "TUN", "Tunisia"),
    ca("TR", "TUR", "Türkiye", &["Republic of Türkiye"]),
    c("TM", "TKM", "Turkmenistan"),
    c("TC", "TCA", "Turks and Caicos Islands"),
    c("TV", "TUV", "Tuvalu"),
    c("UG", "UGA", "Uganda"),
    c("UA", "UKR", "Ukraine"),
    c("AE", "ARE", "United Arab Emirates"),
    ca("GB", "GBR", "United Kingdom", &["United Kingdom of Great Britain and Northern Ireland"]),
    ca("US", "USA", "United States", &["United States of America"]),
    c("UM", "UMI", "United States Minor Outlying Islands"),
    c("UY", "URY", "Uruguay"),
    c("UZ", "UZB", "Uzbekistan"),
    c("VU", "VUT", "Vanuatu"),
    ca("VE", "VEN", "Venezuela, Bolivarian Republic of", &["Bolivarian Republic of Venezuela", "Venezuela"]),
    ca("VN", "VNM", "Viet Nam", &["Vietnam"]),
    c("VG", "VGB", "Virgin Islands, British"),
    c("VI", "VIR", "Virgin Islands, U.S."),
    c("WF", "WLF", "Wallis and Futuna"),
    c("EH", "ESH", "Western Sahara"),
    c("YE", "YEM", "Yemen"),
    c("ZM", "ZMB", "Zambia"),
    c("ZW", "ZWE", "Zimbabwe"),
];

// ---------------------------------------------------------------------------
// Override table
// ---------------------------------------------------------------------------

/// Bumped whenever entries are appended to [`OVERRIDES`].
pub const OVERRIDES_VERSION: u32 = 3;

/// Display names the registry does not know, mostly World Bank and
/// colloquial spellings. Append only: existing entries are never edited.
#[rustfmt::skip]
pub static OVERRIDES: &[(&str, &str)] = &[
    // v1
    ("Cape Verde", "CPV"),
    ("Cote d'Ivoire", "CIV"),
    ("Côte d’Ivoire", "CIV"),
    ("Ivory Coast", "CIV"),
    ("Korea, Dem. People's Rep.", "PRK"),
    ("Korea, DPR", "PRK"),
    ("DPRK", "PRK"),
    ("Korea, Rep.", "KOR"),
    ("ROK", "KOR"),
    // v2
    ("Congo, Dem. Rep.", "COD"),
    ("Democratic Republic of the Congo", "COD"),
    ("DR Congo", "COD"),
    ("Congo, Rep.", "COG"),
    ("Republic of the Congo", "COG"),
    ("Egypt, Arab Rep.", "EGY"),
    ("Gambia, The", "GMB"),
    ("The Gambia", "GMB"),
    ("Bahamas, The", "BHS"),
    ("Iran, Islamic Rep.", "IRN"),
    ("Kyrgyz Republic", "KGZ"),
    ("Lao PDR", "LAO"),
    ("Micronesia, Fed. Sts.", "FSM"),
    ("Slovak Republic", "SVK"),
    ("St. Kitts and Nevis", "KNA"),
    ("St. Lucia", "LCA"),
    ("St. Vincent and the Grenadines", "VCT"),
    ("Venezuela, RB", "VEN"),
    ("Yemen, Rep.", "YEM"),
    ("Hong Kong SAR, China", "HKG"),
    ("Macao SAR, China", "MAC"),
    ("West Bank and Gaza", "PSE"),
    // v3
    ("Turkey", "TUR"),
    ("Turkiye", "TUR"),
    ("Russia", "RUS"),
    ("Swaziland", "SWZ"),
    ("Macedonia", "MKD"),
    ("Burma", "MMR"),
    ("East Timor", "TLS"),
    ("Sao Tome & Principe", "STP"),
    ("Kosovo", "XKX"),
];

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Country display name → ISO 3166-1 alpha-3 code.
///
/// The registry is consulted first (short name, other names, alpha-2 and
/// alpha-3 codes, all case-insensitive), then the override table.
#[derive(Debug, Clone)]
pub struct CountryCodes {
    registry: BTreeMap<String, &'static str>,
    overrides: BTreeMap<String, String>,
}

impl Default for CountryCodes {
    fn default() -> Self {
        let mut registry = BTreeMap::new();
        for entry in REGISTRY {
            let keys = [entry.alpha2, entry.alpha3, entry.name]
                .into_iter()
                .chain(entry.aliases.iter().copied());
            for key in keys {
                registry.insert(normalize(key), entry.alpha3);
            }
        }
        let overrides = OVERRIDES
            .iter()
            .map(|(name, code)| (normalize(name), code.to_string()))
            .collect();
        CountryCodes {
            registry,
            overrides,
        }
    }
}

impl CountryCodes {
    /// Standard table plus deployment-specific overrides. Extra entries
    /// shadow built-in overrides of the same name, never the registry.
    pub fn with_overrides<'a>(extra: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        let mut codes = CountryCodes::default();
        for (name, code) in extra {
            codes
                .overrides
                .insert(normalize(name), code.trim().to_ascii_uppercase());
        }
        codes
    }

    /// Look a name up. Never fails: unknown names give `None`.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        let key = normalize(name);
        if key.is_empty() {
            return None;
        }
        self.registry
            .get(&key)
            .copied()
            .or_else(|| self.overrides.get(&key).map(String::as_str))
    }
}

/// Resolve with the built-in tables.
pub fn country_to_region_code(name: &str) -> Option<&'static str> {
    static CODES: OnceLock<CountryCodes> = OnceLock::new();
    CODES.get_or_init(CountryCodes::default).resolve(name)
}

/// Rows of `table` whose `column` resolves, paired with their code, plus the
/// number of rows that could not be mapped.
pub fn map_join<'t>(
    codes: &CountryCodes,
    table: &'t Table,
    column: &str,
) -> (Vec<(String, &'t [CellValue])>, usize) {
    let Some(idx) = table.column_index(column) else {
        return (Vec::new(), table.len());
    };
    let mut joined = Vec::new();
    let mut unmapped = 0usize;
    for row in &table.rows {
        match row[idx].as_text().and_then(|name| codes.resolve(name)) {
            Some(code) => joined.push((code.to_string(), row.as_slice())),
            None => unmapped += 1,
        }
    }
    if unmapped > 0 {
        log::warn!("{unmapped} countries could not be mapped");
    }
    (joined, unmapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_names_and_codes_resolve() {
        assert_eq!(country_to_region_code("Côte d'Ivoire"), Some("CIV"));
        assert_eq!(country_to_region_code("kenya"), Some("KEN"));
        assert_eq!(country_to_region_code(" South Korea "), Some("KOR"));
        assert_eq!(country_to_region_code("BR"), Some("BRA"));
        assert_eq!(country_to_region_code("chl"), Some("CHL"));
    }

    #[test]
    fn overrides_cover_irregular_spellings() {
        assert_eq!(country_to_region_code("Cape Verde"), Some("CPV"));
        assert_eq!(country_to_region_code("Cote d'Ivoire"), Some("CIV"));
        assert_eq!(country_to_region_code("Korea, Dem. People's Rep."), Some("PRK"));
        assert_eq!(country_to_region_code("Korea, Rep."), Some("KOR"));
    }

    #[test]
    fn unknown_names_resolve_to_none() {
        assert_eq!(country_to_region_code("Atlantis"), None);
        assert_eq!(country_to_region_code(""), None);
    }

    #[test]
    fn override_entries_are_unique() {
        let mut seen = std::collections::BTreeSet::new();
        for (name, code) in OVERRIDES {
            assert!(seen.insert(normalize(name)), "duplicate override {name}");
            assert_eq!(code.len(), 3);
        }
    }

    #[test]
    fn configured_overrides_extend_the_table() {
        let extra: BTreeMap<String, String> =
            [("Republic of Atlantis".to_string(), "atl".to_string())].into();
        let codes = CountryCodes::with_overrides(&extra);
        assert_eq!(codes.resolve("republic of atlantis"), Some("ATL"));
        assert_eq!(codes.resolve("Chile"), Some("CHL"));
    }

    #[test]
    fn map_join_drops_unresolvable_rows() {
        let mut t = Table::new(vec!["Country".into(), "x".into()]);
        t.push_row(vec!["Côte d'Ivoire".into(), CellValue::Float(1.0)]);
        t.push_row(vec!["Atlantis".into(), CellValue::Float(2.0)]);
        let (joined, unmapped) = map_join(&CountryCodes::default(), &t, "Country");
        assert_eq!(unmapped, 1);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].0, "CIV");
    }
}
