//! Static per-category seed table for the placeholder generator.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorSeed {
    pub id: u32,
    pub author: &'static str,
    pub keywords: &'static str,
}

const fn seed(id: u32, author: &'static str, keywords: &'static str) -> GeneratorSeed {
    GeneratorSeed { id, author, keywords }
}

const NATURE: &[GeneratorSeed] = &[
    seed(1018, "Landscape Photography", "mountain, nature, landscape"),
    seed(1015, "Nature Shots", "forest, trees, nature"),
    seed(1022, "Ocean Views", "ocean, water, blue"),
    seed(1025, "Sunset Collection", "sunset, sky, colors"),
    seed(1036, "Wildlife Photography", "animals, wildlife, nature"),
    seed(1043, "Garden Beauty", "flowers, garden, plants"),
    seed(1044, "River Scenes", "river, water, peaceful"),
    seed(1051, "Mountain Peaks", "mountains, snow, peaks"),
    seed(1059, "Beach Views", "beach, sand, ocean"),
    seed(1062, "Forest Path", "forest, path, trees"),
];

const ABSTRACT: &[GeneratorSeed] = &[
    seed(1080, "Digital Art", "abstract, digital, art"),
    seed(1081, "Geometric Patterns", "geometric, pattern, shapes"),
    seed(1082, "Color Gradients", "gradient, colors, smooth"),
    seed(1083, "Modern Art", "modern, abstract, creative"),
    seed(1084, "Texture Art", "texture, surface, material"),
    seed(1085, "Light Effects", "light, effects, glow"),
    seed(1086, "Fluid Art", "fluid, liquid, flow"),
    seed(1087, "Minimal Design", "minimal, clean, simple"),
    seed(1088, "Color Splash", "color, vibrant, splash"),
    seed(1089, "Pattern Design", "pattern, design, repeat"),
];

const TECHNOLOGY: &[GeneratorSeed] = &[
    seed(1090, "Tech World", "technology, computer, digital"),
    seed(1091, "Circuit Boards", "circuit, electronics, tech"),
    seed(1092, "Code Life", "coding, programming, screen"),
    seed(1093, "Future Tech", "futuristic, sci-fi, tech"),
    seed(1094, "Digital Matrix", "matrix, digital, code"),
    seed(1095, "Cyber Space", "cyber, space, digital"),
    seed(1096, "Tech Patterns", "tech, pattern, grid"),
    seed(1097, "Binary World", "binary, data, numbers"),
    seed(1098, "Network Design", "network, connection, tech"),
    seed(1099, "AI Concept", "ai, artificial, intelligence"),
];

const SPACE: &[GeneratorSeed] = &[
    seed(1100, "Cosmic Views", "space, cosmos, universe"),
    seed(1101, "Galaxy Art", "galaxy, stars, nebula"),
    seed(1102, "Planet Earth", "earth, planet, space"),
    seed(1103, "Star Fields", "stars, field, night"),
    seed(1104, "Moon Phases", "moon, phases, lunar"),
    seed(1105, "Solar System", "solar, system, planets"),
    seed(1106, "Deep Space", "deep, space, void"),
    seed(1107, "Astronaut Life", "astronaut, space, suit"),
    seed(1108, "Rocket Launch", "rocket, launch, space"),
    seed(1109, "Alien Worlds", "alien, world, fantasy"),
];

const ANIMALS: &[GeneratorSeed] = &[
    seed(1110, "Wildlife Photography", "animals, wildlife, nature"),
    seed(1111, "Big Cats", "lion, tiger, cat"),
    seed(1112, "Ocean Life", "ocean, marine, fish"),
    seed(1113, "Bird Watching", "birds, flying, wings"),
    seed(1114, "Safari Adventures", "safari, elephant, africa"),
    seed(1115, "Pet Love", "pets, dogs, cats"),
    seed(1116, "Wild Horses", "horses, wild, running"),
    seed(1117, "Bear Country", "bears, forest, wild"),
    seed(1118, "Butterfly Garden", "butterfly, garden, colorful"),
    seed(1119, "Wolf Pack", "wolf, pack, howling"),
];

const CARS: &[GeneratorSeed] = &[
    seed(1120, "Supercar Collection", "supercar, fast, luxury"),
    seed(1121, "Classic Cars", "classic, vintage, retro"),
    seed(1122, "Racing World", "racing, speed, track"),
    seed(1123, "Motorcycle Life", "motorcycle, bike, road"),
    seed(1124, "Sports Cars", "sports, car, performance"),
    seed(1125, "Truck Power", "truck, power, heavy"),
    seed(1126, "Electric Future", "electric, future, clean"),
    seed(1127, "Off Road", "offroad, adventure, terrain"),
    seed(1128, "City Drives", "city, urban, driving"),
    seed(1129, "Car Shows", "show, exhibition, display"),
];

const GAMING: &[GeneratorSeed] = &[
    seed(1130, "Game Art", "gaming, art, character"),
    seed(1131, "Fantasy Worlds", "fantasy, world, magic"),
    seed(1132, "Sci-Fi Gaming", "scifi, future, gaming"),
    seed(1133, "RPG Adventures", "rpg, adventure, quest"),
    seed(1134, "Action Heroes", "action, hero, warrior"),
    seed(1135, "Game Weapons", "weapons, sword, gun"),
    seed(1136, "Medieval Times", "medieval, castle, knight"),
    seed(1137, "Dragon Lore", "dragon, fire, mythical"),
    seed(1138, "Cyber Gaming", "cyber, neon, gaming"),
    seed(1139, "Battle Scenes", "battle, war, epic"),
];

const MINIMALIST: &[GeneratorSeed] = &[
    seed(1140, "Clean Design", "minimalist, clean, simple"),
    seed(1141, "White Space", "white, space, minimal"),
    seed(1142, "Geometric Simple", "geometric, simple, shape"),
    seed(1143, "Monochrome Art", "monochrome, black, white"),
    seed(1144, "Elegant Lines", "elegant, lines, smooth"),
    seed(1145, "Subtle Colors", "subtle, soft, colors"),
    seed(1146, "Modern Minimal", "modern, minimal, design"),
    seed(1147, "Pure Forms", "pure, form, basic"),
    seed(1148, "Calm Spaces", "calm, peaceful, zen"),
    seed(1149, "Simple Beauty", "simple, beauty, pure"),
];

/// Seeds for a category; unknown slugs borrow the abstract table.
pub fn generator_seeds(category: &str) -> &'static [GeneratorSeed] {
    match category {
        "nature" => NATURE,
        "technology" => TECHNOLOGY,
        "space" => SPACE,
        "animals" => ANIMALS,
        "cars" => CARS,
        "gaming" => GAMING,
        "minimalist" => MINIMALIST,
        _ => ABSTRACT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_category_falls_back_to_abstract() {
        assert_eq!(generator_seeds("underwater"), generator_seeds("abstract"));
        assert_eq!(generator_seeds("space")[0].author, "Cosmic Views");
    }
}
