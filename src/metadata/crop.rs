//! Camera model to crop factor lookup.
//!
//! The built-in table maps model strings, exactly as cameras write them,
//! to the ratio of a full-frame diagonal to that model's sensor diagonal.
//! Entries are sorted by byte value so lookups are a binary search.

/// Resolves a camera model string to a crop factor.
pub trait CropFactorLookup: Send + Sync {
    /// Crop factor for an exact model string.
    fn crop_factor(&self, model: &str) -> Option<f64>;
}

/// Table compiled into the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCropTable;

impl CropFactorLookup for BuiltinCropTable {
    fn crop_factor(&self, model: &str) -> Option<f64> {
        CROP_FACTORS
            .binary_search_by(|(name, _)| name.as_bytes().cmp(model.as_bytes()))
            .ok()
            .map(|i| CROP_FACTORS[i].1)
    }
}

/// Look up `model`, retrying with a vendor prefix on a miss.
///
/// Some writers strip the vendor from the model ("D100" for "NIKON D100",
/// "EOS 5D" for "Canon EOS 5D"), so a miss is retried with the first word
/// of `make` prepended, then with "Canon ".
pub fn lookup_crop_factor(table: &dyn CropFactorLookup, make: &str, model: &str) -> Option<f64> {
    if model.is_empty() {
        return None;
    }
    if let Some(factor) = table.crop_factor(model) {
        return Some(factor);
    }

    let vendor = make.split_whitespace().next().unwrap_or("");
    if !vendor.is_empty() && !starts_with_ignore_case(model, vendor) {
        if let Some(factor) = table.crop_factor(&format!("{vendor} {model}")) {
            return Some(factor);
        }
    }

    if starts_with_ignore_case(model, "Canon") {
        return None;
    }
    table.crop_factor(&format!("Canon {model}"))
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Model name and crop factor, sorted by byte value.
#[rustfmt::skip]
static CROP_FACTORS: &[(&str, f64)] = &[
    ("ADR6410LVW", 7.000000),
    ("AE-1", 1.000000),
    ("C3000Z", 7.000000),
    ("C5060WZ", 4.845086),
    ("C6902", 5.600000),
    ("COOLPIX P7100", 4.652324),
    ("CYBERSHOT", 7.000000),
    ("CanoScan 8800F", 1.000000),
    ("Canon EOS 10D", 1.621622),
    ("Canon EOS 1300D", 1.621622),
    ("Canon EOS 20D", 1.621622),
    ("Canon EOS 30D", 1.621622),
    ("Canon EOS 40D", 1.621622),
    ("Canon EOS 50D", 1.621622),
    ("Canon EOS 5D", 1.000000),
    ("Canon EOS 5D Mark II", 1.000000),
    ("Canon EOS 5D Mark III", 1.000000),
    ("Canon EOS 5D Mark IV", 1.000000),
    ("Canon EOS 5DS", 1.000000),
    ("Canon EOS 5DS R", 1.000000),
    ("Canon EOS 60D", 1.621622),
    ("Canon EOS 6D", 1.000000),
    ("Canon EOS 6D Mark II", 1.000000),
    ("Canon EOS 700D", 1.621622),
    ("Canon EOS 70D", 1.621622),
    ("Canon EOS 77D", 1.621622),
    ("Canon EOS 7D", 1.621622),
    ("Canon EOS 7D Mark II", 1.621622),
    ("Canon EOS 80D", 1.621622),
    ("Canon EOS 90D", 1.621622),
    ("Canon EOS D30", 1.621622),
    ("Canon EOS D60", 1.621622),
    ("Canon EOS DIGITAL REBEL", 1.621622),
    ("Canon EOS DIGITAL REBEL XT", 1.621622),
    ("Canon EOS M", 1.621622),
    ("Canon EOS M100", 1.621622),
    ("Canon EOS M2", 1.621622),
    ("Canon EOS M3", 1.621622),
    ("Canon EOS M5", 1.621622),
    ("Canon EOS M50", 1.621622),
    ("Canon EOS M6", 1.621622),
    ("Canon EOS M6 Mark II", 1.621622),
    ("Canon EOS R5", 1.000000),
    ("Canon EOS REBEL T2i", 1.621622),
    ("Canon EOS REBEL T3", 1.621622),
    ("Canon EOS REBEL T3i", 1.621622),
    ("Canon EOS REBEL T4i", 1.621622),
    ("Canon EOS REBEL T5", 1.621622),
    ("Canon EOS REBEL T6", 1.621622),
    ("Canon EOS RP", 1.000000),
    ("Canon EOS Rebel T6", 1.621622),
    ("Canon EOS-1D", 1.255028),
    ("Canon EOS-1D Mark II", 1.255028),
    ("Canon EOS-1D Mark II N", 1.255028),
    ("Canon EOS-1D Mark III", 1.255028),
    ("Canon EOS-1D Mark IV", 1.255028),
    ("Canon EOS-1D X", 1.000000),
    ("Canon EOS-1DS", 1.000000),
    ("Canon EOS-1Ds Mark II", 1.000000),
    ("Canon EOS-1Ds Mark III", 1.000000),
    ("Canon EOS-1Ds Mark IV", 1.000000),
    ("Canon PowerShot A20", 5.643778),
    ("Canon PowerShot A430", 7.211103),
    ("Canon PowerShot A520", 4.845086),
    ("Canon PowerShot A60", 6.516057),
    ("Canon PowerShot A610", 4.845086),
    ("Canon PowerShot A620", 4.845086),
    ("Canon PowerShot A80", 4.845086),
    ("Canon PowerShot A85", 6.516057),
    ("Canon PowerShot G5", 4.845086),
    ("Canon PowerShot G5 X Mark II", 2.727273),
    ("Canon PowerShot G7 X", 2.727273),
    ("Canon PowerShot G7 X Mark II", 2.727273),
    ("Canon PowerShot G9", 4.652324),
    ("Canon PowerShot G9 X Mark II", 2.727273),
    ("Canon PowerShot S100", 4.652324),
    ("Canon PowerShot S2 IS", 6.015934),
    ("Canon PowerShot S200", 4.652324),
    ("Canon PowerShot S70", 4.845086),
    ("Canon PowerShot S95", 4.652324),
    ("Canon PowerShot SD10", 6.025991),
    ("Canon PowerShot SD1100 IS", 6.015934),
    ("Canon PowerShot SD450", 6.015934),
    ("Canon PowerShot SD550", 4.845086),
    ("Canon PowerShot SD780 IS", 5.643778),
    ("Canon PowerShot SD790 IS", 5.643778),
    ("Canon PowerShot SX110 IS", 6.015934),
    ("Canon PowerShot SX530 HS", 5.643778),
    ("Canon PowerShot SX600 HS", 5.643778),
    ("Canon VIXIA HF10", 7.611984),
    ("DC-S1R", 1.000000),
    ("DC-ZS200", 2.727273),
    ("DC210 Zoom (V03.10)", 6.591501),
    ("DCR-TRV30", 10.816654),
    ("DMC-CM1", 2.727273),
    ("DMC-FS3", 6.025991),
    ("DMC-FX8", 6.025991),
    ("DMC-FZ5", 6.015934),
    ("DMC-G3", 1.999381),
    ("DMC-GF1", 1.999381),
    ("DMC-GF2", 1.999381),
    ("DMC-GM1", 1.999381),
    ("DMC-GX7", 1.999381),
    ("DMC-LX100", 1.999381),
    ("DMC-TS2", 5.692976),
    ("DMC-TS3", 5.692976),
    ("DMC-ZS1", 6.025991),
    ("DMC-ZS100", 2.727273),
    ("DMC-ZS7", 5.692976),
    ("DSC-N1", 4.845086),
    ("DSC-P52", 6.516057),
    ("DSC-RX1", 1.000000),
    ("DSC-RX100", 2.727273),
    ("DSC-W120", 6.015934),
    ("DSC-W560", 5.600000),
    ("DSC-W80", 6.025991),
    ("DSC-W800", 5.643778),
    ("DSC-WX1", 5.623000),
    ("DSC-WX300", 5.643778),
    ("DV 5700", 7.000000),
    ("DiMAGE 7", 3.900000),
    ("Digital Link", 1.000000),
    ("E-M10MarkII", 1.999381),
    ("E-PM2", 1.999381),
    ("E3100", 6.516057),
    ("E5200", 4.845086),
    ("E5400", 4.845086),
    ("E6653", 5.600000),
    ("E990", 4.845086),
    ("EOS 5D Mark II", 1.000000),
    ("EX1", 5.748494),
    ("Electro 35 GSN", 1.000000),
    ("Epson Stylus NX420", 1.000000),
    ("FinePix F900EXR", 5.326000),
    ("FinePix S3Pro", 1.529400),
    ("FinePix4900ZOOM", 4.652324),
    ("FinePixS2Pro", 1.529400),
    ("FrontRow Wear", 5.080000),
    ("G8141", 5.643778),
    ("GFX 100", 0.790048),
    ("GFX 50R", 0.790048),
    ("GFX 50S", 0.790048),
    ("GFX100S", 0.790048),
    ("GR II", 1.529400),
    ("H1A1000", 7.000000),
    ("H8166", 5.692976),
    ("HD7", 5.692976),
    ("HDR-SR1", 7.211103),
    ("HERO6 Black", 5.643778),
    ("HP PhotoSmart C945 (V01.60)", 1.000000),
    ("HP Scanjet 4800", 1.000000),
    ("HTC Touch Diamond P370", 10.000000),
    ("HTC Touch Diamond P3700", 10.000000),
    ("HTC-8900", 7.680000),
    ("Hewlett-Packard PSC 750 Scanner", 1.000000),
    ("ILCE-7", 1.000000),
    ("ILCE-7M3", 1.000000),
    ("ILCE-7RM2", 1.000000),
    ("ILCE-7S", 1.000000),
    ("KODAK DC240 ZOOM DIGITAL CAMERA", 6.591501),
    ("KODAK EASYSHARE V1003 ZOOM DIGITAL CAMERA", 4.845086),
    ("KODAK V530 ZOOM DIGITAL CAMERA", 4.241825),
    ("Kodak CLAS Digital Film Scanner / HR200", 1.000000),
    ("L16", 1.000000),
    ("LEICA M MONOCHROM (Typ 246)", 1.000000),
    ("LEICA M10", 1.000000),
    ("LEICA Q (Typ 116)", 1.000000),
    ("LEICA Q2", 1.000000),
    ("LEICA Q2 MONO", 1.000000),
    ("LEICA SL (Typ 601)", 1.000000),
    ("LEICA SL2-S", 1.000000),
    ("LEICA X-U (Typ 113)", 1.529400),
    ("LS-5000", 1.000000),
    ("LS-9000", 1.000000),
    ("Lumia 1020", 4.113183),
    ("Lumia 520", 7.680000),
    ("Lumia 830", 7.680000),
    ("Lumia 920", 7.680000),
    ("Lumia 950", 5.623000),
    ("Lumia 950 XL", 5.623000),
    ("MHS-PM1", 6.015934),
    ("MX880 series", 1.000000),
    ("NEX-3N", 1.529400),
    ("NEX-5N", 1.529400),
    ("NIKON D100", 1.527854),
    ("NIKON D300", 1.527854),
    ("NIKON D3100", 1.527854),
    ("NIKON D3400", 1.527854),
    ("NIKON D4", 1.000000),
    ("NIKON D40", 1.527854),
    ("NIKON D5100", 1.527854),
    ("NIKON D5200", 1.527854),
    ("NIKON D600", 1.000000),
    ("NIKON D610", 1.000000),
    ("NIKON D70", 1.527854),
    ("NIKON D700", 1.000000),
    ("NIKON D70s", 1.527854),
    ("NIKON D80", 1.527854),
    ("NIKON D800", 1.000000),
    ("NIKON D810", 1.000000),
    ("NIKON Z 6", 1.000000),
    ("NIKON Z 7_2", 1.000000),
    ("Nexus 7", 9.440000),
    ("Nexus 9", 10.816654),
    ("Nikon SUPER COOLSCAN 5000 ED", 1.000000),
    ("OpticFilm 8100", 1.000000),
    ("P 65+", 0.642319),
    ("PENTAX K-3 Mark III", 1.529400),
    ("PENTAX K-r", 1.529400),
    ("PENTAX K10D", 1.529400),
    ("PM23300", 7.680000),
    ("Panasonic DMC-GF2", 1.999381),
    ("Perfection V30/V300", 1.000000),
    ("Perfection V39", 1.000000),
    ("PowerShot S95", 4.652324),
    ("QCAM-AA", 7.680000),
    ("QSS-32_33", 1.000000),
    ("RICOH GR III", 1.529400),
    ("RICOH GR IIIx", 1.529400),
    ("RICOH THETA S", 5.615385),
    ("RICOH THETA Z1", 5.615385),
    ("SGH-I917", 7.680000),
    ("SGH-i937", 7.680000),
    ("SIGMA fp L", 1.000000),
    ("SM-G930F", 9.614803),
    ("SM-G965U1", 9.614803),
    ("SM-G975F", 9.614803),
    ("SM-T700", 9.614803),
    ("SM-T713", 9.614803),
    ("SPH-L710", 7.680000),
    ("ScanJet 8200", 1.000000),
    ("Sinarback eVolution 75, Sinar p3 / f3", 1.000000),
    ("TS3100 series", 1.000000),
    ("USB 2.0 Camera", 7.000000),
    ("VAIO Camera Capture Utility", 1.000000),
    ("X-A7", 1.529400),
    ("X-E3", 1.529400),
    ("X-M1", 1.529400),
    ("X-Pro1", 1.529400),
    ("X-Pro2", 1.529400),
    ("X-S10", 1.529400),
    ("X-T2", 1.529400),
    ("X-U (Typ 113)", 1.529400),
    ("X100F", 1.529400),
    ("X100S", 1.529400),
    ("X100T", 1.529400),
    ("X100V", 1.529400),
    ("X1D II 50C", 0.790048),
    ("XP-420", 1.000000),
    ("XP-420 Series", 1.000000),
    ("XZ-1", 4.414995),
    ("ZN5", 7.000000),
    ("iPAQ rx3000", 9.000000),
    ("iPad (6th generation)", 7.611984),
    ("iPad mini (5th generation)", 7.611984),
    ("iPad mini 2", 7.611984),
    ("iPhone", 7.611984),
    ("iPhone 11", 7.000000),
    ("iPhone 11 Pro", 7.000000),
    ("iPhone 12", 7.000000),
    ("iPhone 12 Pro", 7.000000),
    ("iPhone 12 Pro Max", 7.000000),
    ("iPhone 3", 7.611984),
    ("iPhone 3G", 7.611984),
    ("iPhone 3GS", 7.611984),
    ("iPhone 4", 7.611984),
    ("iPhone 4S", 7.611984),
    ("iPhone 5", 7.611984),
    ("iPhone 5s", 7.611984),
    ("iPhone 6", 7.611984),
    ("iPhone 6s", 7.611984),
    ("iPhone 7", 7.611984),
    ("iPhone 8", 7.611984),
    ("iPhone 8 Plus", 7.611984),
    ("iPhone X", 7.611984),
    ("iPhone XR", 7.611984),
    ("iPhone XS", 7.611984),
    ("iPhone XS Max", 7.611984),
    ("iPod touch", 7.611984),
    ("id313", 5.692976),
    ("u1030SW,S1030SW", 5.692976),
];
