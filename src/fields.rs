use serde::Deserialize;

/// Flat record of the strings printed on the certificate.
///
/// Values are expected to be trimmed already; missing values are empty strings and render as
/// empty text. Detail lines (`cert_no`, `cert_class`, `cert_date`) use the `"LABEL: value"`
/// convention, see [`DetailRow::parse`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CertificateFields {
    pub company: String,
    pub title: String,
    #[serde(alias = "amount_number")]
    pub amount_number: String,
    #[serde(alias = "amount_text")]
    pub amount_text: String,
    #[serde(alias = "issued_to_label")]
    pub issued_to_label: String,
    #[serde(alias = "issued_to_name")]
    pub issued_to_name: String,
    #[serde(alias = "cert_no")]
    pub cert_no: String,
    #[serde(alias = "cert_class")]
    pub cert_class: String,
    #[serde(alias = "cert_date")]
    pub cert_date: String,
    #[serde(alias = "signature1_name")]
    pub signature1_name: String,
    #[serde(alias = "signature1_title")]
    pub signature1_title: String,
    #[serde(alias = "signature2_name")]
    pub signature2_name: String,
    #[serde(alias = "signature2_title")]
    pub signature2_title: String,
    #[serde(rename = "sealSVG", alias = "seal_svg", alias = "sealSvg")]
    pub seal_svg: String,
}

impl CertificateFields {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let mut fields: CertificateFields = serde_json::from_str(raw)?;
        fields.trim_in_place();
        Ok(fields)
    }

    pub fn detail_lines(&self) -> [&str; 3] {
        [&self.cert_no, &self.cert_class, &self.cert_date]
    }

    pub fn signatures(&self) -> [(&str, &str); 2] {
        [
            (&self.signature1_name, &self.signature1_title),
            (&self.signature2_name, &self.signature2_title),
        ]
    }

    fn trim_in_place(&mut self) {
        for value in [
            &mut self.company,
            &mut self.title,
            &mut self.amount_number,
            &mut self.amount_text,
            &mut self.issued_to_label,
            &mut self.issued_to_name,
            &mut self.cert_no,
            &mut self.cert_class,
            &mut self.cert_date,
            &mut self.signature1_name,
            &mut self.signature1_title,
            &mut self.signature2_name,
            &mut self.signature2_title,
            &mut self.seal_svg,
        ] {
            let trimmed = value.trim();
            if trimmed.len() != value.len() {
                *value = trimmed.to_string();
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRow {
    pub label: String,
    pub value: String,
}

impl DetailRow {
    /// Splits `"Certificate No: SC-2025-007"` into `"CERTIFICATE NO:"` and `"SC-2025-007"`.
    ///
    /// Only the first colon separates; later colons stay in the value. The formatted label
    /// has a single `"::"` collapsed to `":"`.
    pub fn parse(line: &str) -> DetailRow {
        let (raw_label, raw_value) = match line.split_once(':') {
            Some((label, value)) => (label, value),
            None => (line, ""),
        };
        let label = format!("{}:", raw_label.trim().to_uppercase()).replacen("::", ":", 1);
        DetailRow {
            label,
            value: raw_value.trim().to_string(),
        }
    }
}
