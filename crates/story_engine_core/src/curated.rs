//! crates/story_engine_core/src/curated.rs
//!
//! Hand-written chapters used when no backend produced a usable one. One entry
//! per theme, parameterized only by the child's name and the chapter number.
//! No network and no parsing, so this path cannot fail.

use crate::domain::{ChapterDraft, Theme};

struct CuratedChapter {
    title: &'static str,
    body: &'static str,
}

fn entry_for(theme: Theme) -> CuratedChapter {
    match theme {
        Theme::SpaceAdventure => CuratedChapter {
            title: "The Friendly Alien",
            body: "{name} zipped across the sky in a shiny silver rocket, waving at the twinkling stars. \
                   On a small purple planet, a friendly alien with three curly antennae waved back.\n\n\
                   \"Hello, {name}!\" it giggled. \"I heard you have been working hard. Real space explorers help out at home too!\"\n\n\
                   Together they bounced across the soft moon dust, counted glowing comets and shared star-shaped snacks. \
                   When it was time to fly home, the alien gave {name} a tiny sparkling badge. \
                   \"For chapter {number} of your adventure,\" it said. \"I cannot wait to see what you do next!\"",
        },
        Theme::MagicalForest => CuratedChapter {
            title: "The Whispering Oak",
            body: "Sunlight danced through the leaves as {name} skipped along the mossy path of the magical forest. \
                   A wise old oak tree stretched its branches and whispered, \"Welcome back, {name}!\"\n\n\
                   A family of rabbits hopped out to say hello, and a bluebird sang a song about kind helpers. \
                   The flowers glowed gold wherever {name} stepped, because the forest always knows when someone has been helpful.\n\n\
                   \"This is chapter {number} of your story,\" whispered the oak. \"The forest is proud of you.\"",
        },
        Theme::OceanExplorer => CuratedChapter {
            title: "The Coral Castle",
            body: "{name} dove beneath the sparkling waves in a bubble-shaped submarine. \
                   Bright fish swirled past in rainbow circles, and a cheerful sea turtle swam up to say hello.\n\n\
                   \"Follow me, {name}!\" said the turtle, leading the way to a castle made of pink and orange coral. \
                   Inside, a crab orchestra played a bubbly tune just for their special visitor.\n\n\
                   \"Every good deed makes the ocean shine a little brighter,\" said the turtle. \
                   \"That makes chapter {number} the shiniest yet!\"",
        },
        Theme::DinosaurValley => CuratedChapter {
            title: "The Gentle Giant",
            body: "The sun rose over the green hills of Dinosaur Valley as {name} set off with a backpack full of snacks. \
                   Soon a long-necked dinosaur named Pip lowered her head to say good morning.\n\n\
                   \"Climb on, {name}!\" Pip rumbled happily. From high up on her back they could see waterfalls, \
                   fern forests and a family of baby dinosaurs splashing in a pond.\n\n\
                   \"Helpers like you make the valley a happy place,\" said Pip. \
                   \"Chapter {number} of our adventure is one I will always remember.\"",
        },
        Theme::SuperheroCity => CuratedChapter {
            title: "The Helpful Hero",
            body: "High above the bright rooftops of Hero City, {name} soared with a cape fluttering in the breeze. \
                   Down below, a little kitten was stuck on a low branch, mewing for a friend.\n\n\
                   {name} swooped down, lifted the kitten gently and carried it home to a very grateful neighbour. \
                   The whole street cheered, and the city lights twinkled in thanks.\n\n\
                   \"Being a hero means helping every day,\" said the mayor with a smile. \
                   \"Chapter {number} proves it, {name}!\"",
        },
    }
}

/// Returns the curated chapter for `theme`, titled "Chapter N: <Title>".
pub fn curated_chapter(theme: Theme, child_name: &str, chapter_number: u32) -> ChapterDraft {
    let entry = entry_for(theme);
    let number = chapter_number.to_string();
    ChapterDraft {
        title: format!("Chapter {chapter_number}: {}", entry.title),
        content: entry
            .body
            .replace("{name}", child_name)
            .replace("{number}", &number),
    }
}
