const CUISINE: &[(&str, &[&str])] = &[
    ("English", &["Grilled Chicken", "Tacos", "Pizza", "Burger"]),
    ("Tamil", &["Dosa", "Idli", "Sambar", "Rasam"]),
    ("Hindi", &["Butter Chicken", "Paneer Tikka", "Dal Makhani"]),
    ("Telugu", &["Pesarattu", "Pulihora", "Gutti Vankaya Curry"]),
    ("Kannada", &["Ragi Mudde", "Bisi Bele Bath", "Neer Dosa"]),
    ("Malayalam", &["Appam", "Puttu", "Avial"]),
    ("French", &["Croissant", "Ratatouille", "Crème Brûlée"]),
    ("Spanish", &["Paella", "Tapas", "Churros"]),
    ("Japanese", &["Sushi", "Ramen", "Tempura"]),
    ("Chinese", &["Dim Sum", "Fried Rice", "Kung Pao Chicken"]),
    ("Gujarati", &["Dhokla", "Thepla", "Undhiyu"]),
    ("Marathi", &["Pav Bhaji", "Misal Pav", "Puran Poli"]),
    ("Punjabi", &["Sarson da Saag", "Makki di Roti", "Lassi"]),
    ("Bengali", &["Machher Jhol", "Rasgulla", "Mishti Doi"]),
];

/// Exact, case-sensitive lookup by class label.
pub fn cuisine_for(label: &str) -> Option<&'static [&'static str]> {
    CUISINE
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, dishes)| *dishes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_label() {
        assert_eq!(cuisine_for("Tamil"), Some(&["Dosa", "Idli", "Sambar", "Rasam"][..]));
        assert_eq!(cuisine_for("Bengali").map(<[_]>::len), Some(3));
    }

    #[test]
    fn test_unknown_label() {
        assert_eq!(cuisine_for("andhra_pradesh"), None);
        assert_eq!(cuisine_for("tamil"), None);
    }
}
